//! Party model.

use atlas_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Maximum members per party.
pub const CAPACITY: usize = 6;

/// First party id of every tenant.
pub const ID_BASE: u32 = 1_000_000_000;

/// A party of up to [`CAPACITY`] characters.
///
/// The leader is always a member and members are unique. Transformations
/// return a new value; the registry validates [`Party::check`] before every
/// write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    id: u32,
    world_id: u8,
    leader_id: u32,
    members: Vec<u32>,
}

impl Party {
    /// A new party whose only member is `leader_id`.
    #[must_use]
    pub fn new(id: u32, world_id: u8, leader_id: u32) -> Self {
        Self {
            id,
            world_id,
            leader_id,
            members: vec![leader_id],
        }
    }

    /// Party id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// World the party was formed in.
    #[must_use]
    pub const fn world_id(&self) -> u8 {
        self.world_id
    }

    /// Current leader.
    #[must_use]
    pub const fn leader_id(&self) -> u32 {
        self.leader_id
    }

    /// Members in join order.
    #[must_use]
    pub fn members(&self) -> &[u32] {
        &self.members
    }

    /// Whether `character_id` is a member.
    #[must_use]
    pub fn contains(&self, character_id: u32) -> bool {
        self.members.contains(&character_id)
    }

    /// Whether `character_id` leads the party.
    #[must_use]
    pub const fn is_leader(&self, character_id: u32) -> bool {
        self.leader_id == character_id
    }

    /// Add a member. Adding an existing member is a no-op.
    #[must_use]
    pub fn add_member(mut self, character_id: u32) -> Self {
        if !self.contains(character_id) {
            self.members.push(character_id);
        }
        self
    }

    /// Remove a member.
    #[must_use]
    pub fn remove_member(mut self, character_id: u32) -> Self {
        self.members.retain(|m| *m != character_id);
        self
    }

    /// Hand leadership to `character_id`.
    #[must_use]
    pub const fn set_leader(mut self, character_id: u32) -> Self {
        self.leader_id = character_id;
        self
    }

    /// Registry invariant: capacity, unique members, leader membership.
    ///
    /// # Errors
    ///
    /// [`Error::AtCapacity`] above [`CAPACITY`] members, otherwise
    /// [`Error::Unexpected`] for structural violations.
    pub fn check(&self) -> Result<()> {
        if self.members.len() > CAPACITY {
            return Err(Error::at_capacity("party", self.id, CAPACITY));
        }
        let mut seen = self.members.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.members.len() {
            return Err(Error::Unexpected(format!("party {} has duplicate members", self.id)));
        }
        if !self.contains(self.leader_id) {
            return Err(Error::Unexpected(format!(
                "party {} leader {} is not a member",
                self.id, self.leader_id
            )));
        }
        Ok(())
    }

    /// Rebuild from stored parts.
    #[must_use]
    pub const fn from_parts(id: u32, world_id: u8, leader_id: u32, members: Vec<u32>) -> Self {
        Self {
            id,
            world_id,
            leader_id,
            members,
        }
    }
}
