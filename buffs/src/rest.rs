//! REST representation of a character's buffs.

use crate::model::{Character, StatChange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One active buff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuffModel {
    /// Source skill or item
    pub source_id: i32,
    /// Source level
    pub level: u8,
    /// Seconds
    pub duration: i32,
    /// Stat changes
    pub changes: Vec<StatChange>,
    /// Application time
    pub created_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
}

/// JSON resource for a character's buffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestModel {
    /// Character id as a string
    pub id: String,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Active buffs ordered by source id
    pub buffs: Vec<BuffModel>,
}

/// Character buffs to resource.
#[must_use]
pub fn transform(character: &Character) -> RestModel {
    RestModel {
        id: character.character_id().to_string(),
        world_id: character.world_id(),
        channel_id: character.channel_id(),
        buffs: character
            .buffs()
            .map(|b| BuffModel {
                source_id: b.source_id(),
                level: b.level(),
                duration: b.duration(),
                changes: b.changes().to_vec(),
                created_at: b.created_at(),
                expires_at: b.expires_at(),
            })
            .collect(),
    }
}
