//! Messenger model.

use atlas_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Maximum members per messenger.
pub const CAPACITY: usize = 3;

/// First messenger id of every tenant.
pub const ID_BASE: u32 = 1_000_000_000;

/// A member and the slot it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Character
    pub id: u32,
    /// Seat in the messenger window, `0..CAPACITY`
    pub slot: u8,
}

/// A messenger room of up to [`CAPACITY`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Messenger {
    id: u32,
    world_id: u8,
    members: Vec<Member>,
}

impl Messenger {
    /// A new messenger seating `character_id` in slot 0.
    #[must_use]
    pub fn new(id: u32, world_id: u8, character_id: u32) -> Self {
        Self {
            id,
            world_id,
            members: vec![Member { id: character_id, slot: 0 }],
        }
    }

    /// Messenger id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// World the messenger was opened in.
    #[must_use]
    pub const fn world_id(&self) -> u8 {
        self.world_id
    }

    /// Members in join order.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Member entry of `character_id`.
    #[must_use]
    pub fn member(&self, character_id: u32) -> Option<Member> {
        self.members.iter().copied().find(|m| m.id == character_id)
    }

    /// Whether `character_id` is a member.
    #[must_use]
    pub fn contains(&self, character_id: u32) -> bool {
        self.member(character_id).is_some()
    }

    /// Whether every slot is taken.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.members.len() >= CAPACITY
    }

    /// Whether nobody is left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Lowest slot no member occupies.
    #[must_use]
    pub fn free_slot(&self) -> Option<u8> {
        (0u8..).take(CAPACITY).find(|slot| self.members.iter().all(|m| m.slot != *slot))
    }

    /// Seat `character_id` in the lowest free slot.
    ///
    /// # Errors
    ///
    /// [`Error::AtCapacity`] when no slot is free.
    pub fn add_member(mut self, character_id: u32) -> Result<Self> {
        if self.contains(character_id) {
            return Ok(self);
        }
        let slot = self
            .free_slot()
            .ok_or_else(|| Error::at_capacity("messenger", self.id, CAPACITY))?;
        self.members.push(Member { id: character_id, slot });
        Ok(self)
    }

    /// Remove a member, freeing its slot.
    #[must_use]
    pub fn remove_member(mut self, character_id: u32) -> Self {
        self.members.retain(|m| m.id != character_id);
        self
    }

    /// Registry invariant: capacity, slot range, unique slots and members.
    ///
    /// # Errors
    ///
    /// [`Error::AtCapacity`] above [`CAPACITY`] members, otherwise
    /// [`Error::Unexpected`].
    pub fn check(&self) -> Result<()> {
        if self.members.len() > CAPACITY {
            return Err(Error::at_capacity("messenger", self.id, CAPACITY));
        }
        for (i, member) in self.members.iter().enumerate() {
            if usize::from(member.slot) >= CAPACITY {
                return Err(Error::Unexpected(format!(
                    "messenger {} slot {} out of range",
                    self.id, member.slot
                )));
            }
            let clash = self.members[i + 1..]
                .iter()
                .any(|other| other.slot == member.slot || other.id == member.id);
            if clash {
                return Err(Error::Unexpected(format!(
                    "messenger {} has a duplicate member or slot",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn slots_fill_lowest_first() {
        let messenger = Messenger::new(ID_BASE, 0, 1)
            .add_member(2)
            .unwrap()
            .add_member(3)
            .unwrap();
        let slots: Vec<u8> = messenger.members().iter().map(|m| m.slot).collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert!(messenger.is_full());
    }

    #[test]
    fn freed_slot_is_reused() {
        let messenger = Messenger::new(ID_BASE, 0, 1)
            .add_member(2)
            .unwrap()
            .add_member(3)
            .unwrap()
            .remove_member(1)
            .add_member(4)
            .unwrap();
        assert_eq!(messenger.member(4).unwrap().slot, 0);
        assert!(messenger.check().is_ok());
    }

    #[test]
    fn fourth_member_is_rejected() {
        let full = Messenger::new(ID_BASE, 0, 1)
            .add_member(2)
            .unwrap()
            .add_member(3)
            .unwrap();
        assert!(matches!(full.add_member(4), Err(Error::AtCapacity { capacity: 3, .. })));
    }

    #[test]
    fn check_rejects_duplicate_slots() {
        let messenger = Messenger {
            id: ID_BASE,
            world_id: 0,
            members: vec![Member { id: 1, slot: 1 }, Member { id: 2, slot: 1 }],
        };
        assert!(messenger.check().is_err());
    }
}
