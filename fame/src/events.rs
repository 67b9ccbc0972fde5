//! Fame status events, commands and the character command fame produces.

use atlas_core::Error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Environment key of the fame status topic.
pub const EVENT_TOPIC_FAME_STATUS: &str = "EVENT_TOPIC_FAME_STATUS";
/// Environment key of the fame command topic.
pub const COMMAND_TOPIC_FAME: &str = "COMMAND_TOPIC_FAME";
/// Environment key of the character command topic.
pub const COMMAND_TOPIC_CHARACTER: &str = "COMMAND_TOPIC_CHARACTER";
/// Environment key of the character status topic.
pub const EVENT_TOPIC_CHARACTER_STATUS: &str = "EVENT_TOPIC_CHARACTER_STATUS";

/// `ERROR`
pub const STATUS_ERROR: &str = "ERROR";

/// Already gave fame today.
pub const ERROR_NOT_TODAY: &str = "NOT_TODAY";
/// Already famed this target within a month.
pub const ERROR_NOT_THIS_MONTH: &str = "NOT_THIS_MONTH";
/// Giver below the minimum level.
pub const ERROR_NOT_MINIMUM_LEVEL: &str = "NOT_MINIMUM_LEVEL";
/// Target does not exist.
pub const ERROR_INVALID_NAME: &str = "INVALID_NAME";
/// Amount other than `+1` or `-1`.
pub const ERROR_INVALID_AMOUNT: &str = "INVALID_AMOUNT";
/// Anything else.
pub const ERROR_UNEXPECTED: &str = "UNEXPECTED";

/// Fame status event, keyed by the giver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent<B> {
    /// Request correlation
    pub transaction_id: Uuid,
    /// World
    pub world_id: u8,
    /// Giver
    pub character_id: u32,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    pub body: B,
}

/// Body of `ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Channel the request came from
    pub channel_id: u8,
    /// Error code
    pub error: String,
}

/// Error code reported to the giver.
#[must_use]
pub fn error_code(err: &Error) -> &'static str {
    match err {
        Error::Validation { code, .. } => match code.as_str() {
            ERROR_NOT_TODAY => ERROR_NOT_TODAY,
            ERROR_NOT_THIS_MONTH => ERROR_NOT_THIS_MONTH,
            ERROR_NOT_MINIMUM_LEVEL => ERROR_NOT_MINIMUM_LEVEL,
            ERROR_INVALID_NAME => ERROR_INVALID_NAME,
            ERROR_INVALID_AMOUNT => ERROR_INVALID_AMOUNT,
            _ => ERROR_UNEXPECTED,
        },
        _ => ERROR_UNEXPECTED,
    }
}

/// `REQUEST_CHANGE` command.
pub const COMMAND_REQUEST_CHANGE: &str = "REQUEST_CHANGE";

/// Command envelope consumed from the fame command topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Request correlation
    #[serde(default)]
    pub transaction_id: Uuid,
    /// World
    #[serde(default)]
    pub world_id: u8,
    /// Channel
    #[serde(default)]
    pub channel_id: u8,
    /// Map
    #[serde(default)]
    pub map_id: u32,
    /// Giver
    pub character_id: u32,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Body of `REQUEST_CHANGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestChangeBody {
    /// Receiver
    pub target_id: u32,
    /// `+1` or `-1`
    pub amount: i8,
}

/// `REQUEST_CHANGE_FAME` character command.
pub const CHARACTER_COMMAND_REQUEST_CHANGE_FAME: &str = "REQUEST_CHANGE_FAME";

/// Command asking the character service to apply fame, keyed by the
/// receiver.
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

/// Body of `REQUEST_CHANGE_FAME`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFameBody {
    /// Giver
    pub actor_id: u32,
    /// Always `CHARACTER`
    pub actor_type: String,
    /// `+1` or `-1`
    pub amount: i8,
}

/// `DELETED` character status.
pub const CHARACTER_STATUS_DELETED: &str = "DELETED";

/// Character status event; only the fields fame reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterStatusEvent {
    /// Character
    pub character_id: u32,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
}
