//! REST representation of a messenger.

use crate::model::{Member, Messenger};
use serde::{Deserialize, Serialize};

/// JSON resource for a messenger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestModel {
    /// Messenger id as a string
    pub id: String,
    /// World
    pub world_id: u8,
    /// Members and their slots
    pub members: Vec<Member>,
}

/// Messenger to resource.
#[must_use]
pub fn transform(messenger: &Messenger) -> RestModel {
    RestModel {
        id: messenger.id().to_string(),
        world_id: messenger.world_id(),
        members: messenger.members().to_vec(),
    }
}

/// Body of `POST /messengers`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    /// Character opening the messenger
    pub character_id: u32,
    /// World
    #[serde(default)]
    pub world_id: u8,
}

/// Body of member mutations.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRequest {
    /// Character joining or leaving
    pub character_id: u32,
    /// World, echoed on error events
    #[serde(default)]
    pub world_id: u8,
}
