//! REST representation of a party.

use crate::model::Party;
use atlas_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// JSON resource for a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestModel {
    /// Party id as a string
    pub id: String,
    /// World
    pub world_id: u8,
    /// Leader
    pub leader_id: u32,
    /// Members in join order
    pub members: Vec<u32>,
}

/// Party to resource.
#[must_use]
pub fn transform(party: &Party) -> RestModel {
    RestModel {
        id: party.id().to_string(),
        world_id: party.world_id(),
        leader_id: party.leader_id(),
        members: party.members().to_vec(),
    }
}

/// Resource to party.
///
/// # Errors
///
/// `INVALID_ID` validation for a non-numeric id, or the party invariant.
pub fn extract(model: RestModel) -> Result<Party> {
    let id = model
        .id
        .parse()
        .map_err(|_| Error::validation("INVALID_ID", format!("'{}' is not a party id", model.id)))?;
    let party = Party::from_parts(id, model.world_id, model.leader_id, model.members);
    party.check()?;
    Ok(party)
}

/// Body of `POST /parties`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    /// Leader
    pub leader_id: u32,
    /// World
    #[serde(default)]
    pub world_id: u8,
}

/// Body of member mutations.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRequest {
    /// Character joining
    pub character_id: u32,
}

/// Body of `PATCH /parties/:id`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    /// Current leader requesting the change
    pub actor_id: u32,
    /// New leader
    pub leader_id: u32,
}
