//! Buff status events and commands.

use crate::model::{Buff, StatChange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Environment key of the buff status topic.
pub const EVENT_TOPIC_CHARACTER_BUFF_STATUS: &str = "EVENT_TOPIC_CHARACTER_BUFF_STATUS";
/// Environment key of the buff command topic.
pub const COMMAND_TOPIC_CHARACTER_BUFF: &str = "COMMAND_TOPIC_CHARACTER_BUFF";

/// `BUFF_APPLIED`
pub const STATUS_APPLIED: &str = "BUFF_APPLIED";
/// `BUFF_EXPIRED`
pub const STATUS_EXPIRED: &str = "BUFF_EXPIRED";

/// Buff status event, keyed by the buffed character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent<B> {
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Buffed character
    pub character_id: u32,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    pub body: B,
}

/// Body of `BUFF_APPLIED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedBody {
    /// Character that cast the buff
    pub from_id: u32,
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

impl AppliedBody {
    /// Body for `buff` cast by `from_id`.
    #[must_use]
    pub fn new(from_id: u32, buff: &Buff) -> Self {
        Self {
            from_id,
            source_id: buff.source_id(),
            level: buff.level(),
            duration: buff.duration(),
            changes: buff.changes().to_vec(),
            created_at: buff.created_at(),
            expires_at: buff.expires_at(),
        }
    }
}

/// Body of `BUFF_EXPIRED`, for both natural expiry and cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiredBody {
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

impl From<&Buff> for ExpiredBody {
    fn from(buff: &Buff) -> Self {
        Self {
            source_id: buff.source_id(),
            level: buff.level(),
            duration: buff.duration(),
            changes: buff.changes().to_vec(),
            created_at: buff.created_at(),
            expires_at: buff.expires_at(),
        }
    }
}

/// Environment key of the character command topic poison damage goes to.
pub const COMMAND_TOPIC_CHARACTER: &str = "COMMAND_TOPIC_CHARACTER";
/// Character command `CHANGE_HP`.
pub const CHARACTER_COMMAND_CHANGE_HP: &str = "CHANGE_HP";

/// Command envelope produced on the character command topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterCommand<B> {
    /// Request correlation
    pub transaction_id: Uuid,
    /// World
    pub world_id: u8,
    /// Receiver
    pub character_id: u32,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    pub body: B,
}

/// Body of `CHANGE_HP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeHpBody {
    /// Channel the character is on
    pub channel_id: u8,
    /// Signed HP delta
    pub amount: i16,
}

/// `APPLY` command.
pub const COMMAND_APPLY: &str = "APPLY";
/// `CANCEL` command.
pub const COMMAND_CANCEL: &str = "CANCEL";
/// `CANCEL_ALL` command.
pub const COMMAND_CANCEL_ALL: &str = "CANCEL_ALL";

/// Command envelope consumed from the buff command topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// World
    #[serde(default)]
    pub world_id: u8,
    /// Channel
    #[serde(default)]
    pub channel_id: u8,
    /// Target character
    pub character_id: u32,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Body of `APPLY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyBody {
    /// Caster
    #[serde(default)]
    pub from_id: u32,
    /// Source skill or item
    pub source_id: i32,
    /// Source level
    #[serde(default)]
    pub level: u8,
    /// Seconds
    pub duration: i32,
    /// Stat changes
    pub changes: Vec<StatChange>,
}

/// Body of `CANCEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    /// Source to cancel
    pub source_id: i32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_command_decodes() {
        let cmd: Command = serde_json::from_value(json!({
            "worldId": 1,
            "channelId": 2,
            "characterId": 7,
            "type": "APPLY",
            "body": {"fromId": 3, "sourceId": 2_001_002, "level": 10, "duration": 120,
                     "changes": [{"type": "MAGIC_GUARD", "amount": 80}]}
        }))
        .unwrap();
        let body: ApplyBody = serde_json::from_value(cmd.body).unwrap();
        assert_eq!(body.changes, vec![StatChange::new("MAGIC_GUARD", 80)]);
    }
}
