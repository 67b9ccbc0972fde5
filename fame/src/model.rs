//! Fame log model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum level to give fame.
pub const MINIMUM_LEVEL: u8 = 15;

/// One fame given by `character_id` to `target_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FameLog {
    /// Row id
    pub id: Uuid,
    /// Owning tenant
    pub tenant_id: Uuid,
    /// Giver
    pub character_id: u32,
    /// Receiver
    pub target_id: u32,
    /// `+1` or `-1`
    pub amount: i8,
    /// When the fame was given
    pub created_at: DateTime<Utc>,
}

/// Where a request was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Map
    pub map_id: u32,
}
