//! REST representation of fame logs.

use crate::model::FameLog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JSON resource for one fame log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestModel {
    /// Row id
    pub id: String,
    /// Giver
    pub character_id: u32,
    /// Receiver
    pub target_id: u32,
    /// `+1` or `-1`
    pub amount: i8,
    /// When the fame was given
    pub created_at: DateTime<Utc>,
}

/// Log to resource.
#[must_use]
pub fn transform(log: &FameLog) -> RestModel {
    RestModel {
        id: log.id.to_string(),
        character_id: log.character_id,
        target_id: log.target_id,
        amount: log.amount,
        created_at: log.created_at,
    }
}

/// Body of `POST /characters/:id/fame`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    /// Receiver
    pub target_id: u32,
    /// `+1` or `-1`
    pub amount: i8,
    /// World
    #[serde(default)]
    pub world_id: u8,
    /// Channel
    #[serde(default)]
    pub channel_id: u8,
}
