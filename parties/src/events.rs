//! Party status events and commands.

use atlas_core::Error;
use serde::{Deserialize, Serialize};

/// Environment key of the party status topic.
pub const EVENT_TOPIC_PARTY_STATUS: &str = "EVENT_TOPIC_PARTY_STATUS";
/// Environment key of the party command topic.
pub const COMMAND_TOPIC_PARTY: &str = "COMMAND_TOPIC_PARTY";

/// `CREATED`
pub const STATUS_CREATED: &str = "CREATED";
/// `JOINED`
pub const STATUS_JOINED: &str = "JOINED";
/// `LEFT`
pub const STATUS_LEFT: &str = "LEFT";
/// `EXPEL`
pub const STATUS_EXPEL: &str = "EXPEL";
/// `DISBANDED`
pub const STATUS_DISBANDED: &str = "DISBANDED";
/// `CHANGE_LEADER`
pub const STATUS_CHANGE_LEADER: &str = "CHANGE_LEADER";
/// `ERROR`
pub const STATUS_ERROR: &str = "ERROR";

/// Party status event, keyed by the acting character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent<B> {
    /// Character that caused the event
    pub actor_id: u32,
    /// World of the party, absent on errors before the party was resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_id: Option<u8>,
    /// Party
    pub party_id: u32,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    pub body: B,
}

/// Body of `CREATED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBody {}

/// Body of `JOINED`, `LEFT` and `EXPEL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberBody {
    /// Character that joined, left or was expelled
    pub character_id: u32,
}

/// Body of `DISBANDED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbandedBody {
    /// Every member at the time of disbanding
    pub members: Vec<u32>,
}

/// Body of `CHANGE_LEADER`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLeaderBody {
    /// New leader
    pub character_id: u32,
}

/// Body of `ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Stable error code
    pub error: String,
    /// Character the failed request targeted
    pub character_id: u32,
}

/// Error code reported to the initiating client.
#[must_use]
pub fn error_code(err: &Error) -> &'static str {
    match err {
        Error::AlreadyIn { .. } => "ALREADY_JOINED",
        Error::NotIn { .. } => "NOT_IN_PARTY",
        Error::AtCapacity { .. } => "AT_CAPACITY",
        Error::NotFound { .. } => "NOT_FOUND",
        Error::Validation { code, .. } if code == "NOT_LEADER" => "NOT_LEADER",
        _ => "UNEXPECTED",
    }
}

/// Command envelope consumed from the party command topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
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

/// `CREATE` command body (empty; the actor becomes leader).
pub const COMMAND_CREATE: &str = "CREATE";
/// `JOIN` command.
pub const COMMAND_JOIN: &str = "JOIN";
/// `LEAVE` command.
pub const COMMAND_LEAVE: &str = "LEAVE";
/// `CHANGE_LEADER` command.
pub const COMMAND_CHANGE_LEADER: &str = "CHANGE_LEADER";
/// `EXPEL` command.
pub const COMMAND_EXPEL: &str = "EXPEL";

/// Body of `JOIN` and `LEAVE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyBody {
    /// Target party
    pub party_id: u32,
}

/// Body of `CHANGE_LEADER` and `EXPEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetBody {
    /// Target party
    pub party_id: u32,
    /// Character acted upon
    pub character_id: u32,
}

/// Environment key of the character status topic.
pub const EVENT_TOPIC_CHARACTER_STATUS: &str = "EVENT_TOPIC_CHARACTER_STATUS";
/// Character status `DELETED`.
pub const CHARACTER_STATUS_DELETED: &str = "DELETED";

/// Character status event; parties only read the id and discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterStatusEvent {
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
    fn codes() {
        assert_eq!(error_code(&Error::AlreadyIn { entity: "party", member: 1 }), "ALREADY_JOINED");
        assert_eq!(error_code(&Error::not_in("party", 1, 2)), "NOT_IN_PARTY");
        assert_eq!(error_code(&Error::validation("NOT_LEADER", "x")), "NOT_LEADER");
        assert_eq!(error_code(&Error::downstream("redis", "x")), "UNEXPECTED");
    }

    #[test]
    fn command_body_defaults() {
        let cmd: Command = serde_json::from_value(json!({"actorId": 5, "type": "CREATE"})).unwrap();
        assert_eq!(cmd.world_id, 0);
        assert!(cmd.body.is_null());
    }

    #[test]
    fn error_event_omits_unknown_world() {
        let event = StatusEvent {
            actor_id: 1,
            world_id: None,
            party_id: 9,
            kind: STATUS_ERROR.into(),
            body: ErrorBody { error: "NOT_FOUND".into(), character_id: 1 },
        };
        let value = serde_json::to_value(event).unwrap();
        assert!(value.get("worldId").is_none());
        assert_eq!(value["body"]["error"], "NOT_FOUND");
    }
}
