//! Messenger status events, commands and the invite command it produces.

use atlas_core::Error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Environment key of the messenger status topic.
pub const EVENT_TOPIC_MESSENGER_STATUS: &str = "EVENT_TOPIC_MESSENGER_STATUS";
/// Environment key of the messenger command topic.
pub const COMMAND_TOPIC_MESSENGER: &str = "COMMAND_TOPIC_MESSENGER";
/// Environment key of the invite command topic.
pub const COMMAND_TOPIC_INVITE: &str = "COMMAND_TOPIC_INVITE";

/// `MESSENGER_CREATED`
pub const STATUS_CREATED: &str = "MESSENGER_CREATED";
/// `MESSENGER_JOINED`
pub const STATUS_JOINED: &str = "MESSENGER_JOINED";
/// `MESSENGER_LEFT`
pub const STATUS_LEFT: &str = "MESSENGER_LEFT";
/// `MESSENGER_ERROR`
pub const STATUS_ERROR: &str = "MESSENGER_ERROR";

/// Already in a messenger when opening one.
pub const ERROR_ALREADY_JOINED_1: &str = "ALREADY_JOINED_1";
/// Already in a messenger when joining or being invited.
pub const ERROR_ALREADY_JOINED_2: &str = "ALREADY_JOINED_2";
/// Every slot is taken.
pub const ERROR_AT_CAPACITY: &str = "AT_CAPACITY";
/// Not a member of the messenger.
pub const ERROR_NOT_IN: &str = "NOT_IN";
/// No such messenger.
pub const ERROR_NOT_FOUND: &str = "NOT_FOUND";
/// Anything else.
pub const ERROR_UNEXPECTED: &str = "UNEXPECTED";

/// Messenger status event, keyed by the acting character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent<B> {
    /// Request correlation
    pub transaction_id: Uuid,
    /// Character that caused the event
    pub actor_id: u32,
    /// Messenger, 0 when none was resolved
    pub messenger_id: u32,
    /// World
    pub world_id: u8,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    pub body: B,
}

/// Body of `MESSENGER_CREATED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBody {}

/// Body of `MESSENGER_JOINED` and `MESSENGER_LEFT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotBody {
    /// Slot taken or freed
    pub slot: u8,
}

/// Body of `MESSENGER_ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Error code
    #[serde(rename = "type")]
    pub error: String,
    /// Character the failed request named, if any
    #[serde(default)]
    pub character_id: u32,
}

/// Operation an error code is resolved for. Opening a messenger and joining
/// one report an existing membership with different codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `CREATE`
    Create,
    /// `JOIN` and `REQUEST_INVITE`
    Join,
    /// `LEAVE`
    Leave,
}

/// Error code reported to the initiating client.
#[must_use]
pub const fn error_code(operation: Operation, err: &Error) -> &'static str {
    match (operation, err) {
        (Operation::Create, Error::AlreadyIn { .. }) => ERROR_ALREADY_JOINED_1,
        (_, Error::AlreadyIn { .. }) => ERROR_ALREADY_JOINED_2,
        (_, Error::AtCapacity { .. }) => ERROR_AT_CAPACITY,
        (_, Error::NotIn { .. }) => ERROR_NOT_IN,
        (_, Error::NotFound { .. }) => ERROR_NOT_FOUND,
        _ => ERROR_UNEXPECTED,
    }
}

/// `CREATE` command, body empty.
pub const COMMAND_CREATE: &str = "CREATE";
/// `JOIN` command.
pub const COMMAND_JOIN: &str = "JOIN";
/// `LEAVE` command.
pub const COMMAND_LEAVE: &str = "LEAVE";
/// `REQUEST_INVITE` command.
pub const COMMAND_REQUEST_INVITE: &str = "REQUEST_INVITE";

/// Command envelope consumed from the messenger command topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Request correlation
    #[serde(default)]
    pub transaction_id: Uuid,
    /// Requesting character
    pub actor_id: u32,
    /// Requesting character's world
    #[serde(default)]
    pub world_id: u8,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Body of `JOIN` and `LEAVE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessengerBody {
    /// Target messenger
    pub messenger_id: u32,
}

/// Body of `REQUEST_INVITE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequestBody {
    /// Character being invited
    pub character_id: u32,
}

/// `MESSENGER` invite type.
pub const INVITE_TYPE_MESSENGER: &str = "MESSENGER";

/// Invite creation command, keyed by the invited character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCommand {
    /// Request correlation
    pub transaction_id: Uuid,
    /// World
    pub world_id: u8,
    /// Always [`INVITE_TYPE_MESSENGER`]
    pub invite_type: String,
    /// Always `CREATE`
    #[serde(rename = "type")]
    pub kind: String,
    /// Invite
    pub body: InviteBody,
}

/// Body of [`InviteCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteBody {
    /// Inviting character
    pub originator_id: u32,
    /// Invited character
    pub target_id: u32,
    /// Messenger the invite is for
    pub reference_id: u32,
}

/// Environment key of the character status topic.
pub const EVENT_TOPIC_CHARACTER_STATUS: &str = "EVENT_TOPIC_CHARACTER_STATUS";
/// Character status `LOGOUT`.
pub const CHARACTER_STATUS_LOGOUT: &str = "LOGOUT";

/// Character status event, reduced to what a logout needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterStatusEvent {
    /// Request correlation
    #[serde(default)]
    pub transaction_id: Uuid,
    /// World
    #[serde(default)]
    pub world_id: u8,
    /// Character
    pub character_id: u32,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn already_joined_depends_on_operation() {
        let err = Error::AlreadyIn { entity: "messenger", member: 1 };
        assert_eq!(error_code(Operation::Create, &err), ERROR_ALREADY_JOINED_1);
        assert_eq!(error_code(Operation::Join, &err), ERROR_ALREADY_JOINED_2);
        assert_eq!(
            error_code(Operation::Join, &Error::at_capacity("messenger", 1, 3)),
            ERROR_AT_CAPACITY
        );
        assert_eq!(
            error_code(Operation::Leave, &Error::Unexpected("x".into())),
            ERROR_UNEXPECTED
        );
    }

    #[test]
    fn command_defaults() {
        let cmd: Command = serde_json::from_value(json!({"actorId": 5, "type": "CREATE"})).unwrap();
        assert!(cmd.transaction_id.is_nil());
        assert_eq!(cmd.world_id, 0);
    }

    #[test]
    fn error_body_carries_code_as_type() {
        let body = serde_json::to_value(ErrorBody {
            error: ERROR_NOT_IN.into(),
            character_id: 4,
        })
        .unwrap();
        assert_eq!(body, json!({"type": "NOT_IN", "characterId": 4}));
    }
}
