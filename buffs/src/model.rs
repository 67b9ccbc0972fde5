//! Buff model.

use atlas_core::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stat change that grants disease immunity.
pub const HOLY_SHIELD: &str = "HOLY_SHIELD";

/// Disease that deals damage on every poison tick.
pub const POISON: &str = "POISON";

/// Stat change types blocked by [`HOLY_SHIELD`].
pub const DISEASES: [&str; 10] = [
    "STUN", "POISON", "SEAL", "DARKNESS", "WEAKEN", "CURSE", "SLOW", "SEDUCE", "CONFUSE", "ZOMBIFY",
];

/// One stat modification carried by a buff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatChange {
    /// Stat type, e.g. `WEAPON_ATTACK` or `STUN`
    #[serde(rename = "type")]
    pub kind: String,
    /// Modifier
    pub amount: i32,
}

impl StatChange {
    /// Change of `kind` by `amount`.
    pub fn new(kind: impl Into<String>, amount: i32) -> Self {
        Self {
            kind: kind.into(),
            amount,
        }
    }

    /// Whether this change is a disease.
    #[must_use]
    pub fn is_disease(&self) -> bool {
        DISEASES.contains(&self.kind.as_str())
    }
}

/// A timed set of stat changes from one source (skill or item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buff {
    source_id: i32,
    level: u8,
    duration: i32,
    changes: Vec<StatChange>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Buff {
    /// A buff starting at `now` and lasting `duration` seconds.
    ///
    /// # Errors
    ///
    /// `INVALID_BUFF` validation when there are no changes or the duration
    /// is negative.
    pub fn new(source_id: i32, level: u8, duration: i32, changes: Vec<StatChange>, now: DateTime<Utc>) -> Result<Self> {
        if changes.is_empty() {
            return Err(Error::validation("INVALID_BUFF", format!("buff {source_id} has no stat changes")));
        }
        if duration < 0 {
            return Err(Error::validation(
                "INVALID_BUFF",
                format!("buff {source_id} has negative duration {duration}"),
            ));
        }
        Ok(Self {
            source_id,
            level,
            duration,
            changes,
            created_at: now,
            expires_at: now + Duration::seconds(i64::from(duration)),
        })
    }

    /// Source skill or item.
    #[must_use]
    pub const fn source_id(&self) -> i32 {
        self.source_id
    }

    /// Source level.
    #[must_use]
    pub const fn level(&self) -> u8 {
        self.level
    }

    /// Duration in seconds.
    #[must_use]
    pub const fn duration(&self) -> i32 {
        self.duration
    }

    /// Stat changes.
    #[must_use]
    pub fn changes(&self) -> &[StatChange] {
        &self.changes
    }

    /// Application time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Expiry time.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the buff has run out at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether any change is a disease.
    #[must_use]
    pub fn is_disease(&self) -> bool {
        self.changes.iter().any(StatChange::is_disease)
    }

    /// Whether this buff grants disease immunity.
    #[must_use]
    pub fn grants_immunity(&self) -> bool {
        self.changes.iter().any(|c| c.kind == HOLY_SHIELD)
    }
}

/// Every active buff of one character, by source id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    world_id: u8,
    channel_id: u8,
    character_id: u32,
    buffs: BTreeMap<i32, Buff>,
}

impl Character {
    /// A character without buffs.
    #[must_use]
    pub const fn new(world_id: u8, channel_id: u8, character_id: u32) -> Self {
        Self {
            world_id,
            channel_id,
            character_id,
            buffs: BTreeMap::new(),
        }
    }

    /// World.
    #[must_use]
    pub const fn world_id(&self) -> u8 {
        self.world_id
    }

    /// Channel the character was last buffed on.
    #[must_use]
    pub const fn channel_id(&self) -> u8 {
        self.channel_id
    }

    /// Character id.
    #[must_use]
    pub const fn character_id(&self) -> u32 {
        self.character_id
    }

    /// Active buffs ordered by source id.
    pub fn buffs(&self) -> impl Iterator<Item = &Buff> {
        self.buffs.values()
    }

    /// Buff from `source_id`.
    #[must_use]
    pub fn buff(&self, source_id: i32) -> Option<&Buff> {
        self.buffs.get(&source_id)
    }

    /// Whether an unexpired buff grants immunity at `now`.
    #[must_use]
    pub fn is_immune(&self, now: DateTime<Utc>) -> bool {
        self.buffs
            .values()
            .any(|b| b.grants_immunity() && !b.is_expired(now))
    }

    /// Damage per tick of the first unexpired poison at `now`.
    #[must_use]
    pub fn poison(&self, now: DateTime<Utc>) -> Option<i32> {
        self.buffs
            .values()
            .filter(|b| !b.is_expired(now))
            .flat_map(|b| b.changes.iter())
            .find(|c| c.kind == POISON)
            .map(|c| c.amount)
    }

    /// Move to `channel_id`.
    #[must_use]
    pub const fn on_channel(mut self, channel_id: u8) -> Self {
        self.channel_id = channel_id;
        self
    }

    /// Add `buff`, replacing any buff from the same source.
    #[must_use]
    pub fn apply(mut self, buff: Buff) -> Self {
        self.buffs.insert(buff.source_id, buff);
        self
    }

    /// Remove the buff from `source_id`.
    pub fn cancel(&mut self, source_id: i32) -> Option<Buff> {
        self.buffs.remove(&source_id)
    }

    /// Remove every buff.
    pub fn cancel_all(&mut self) -> Vec<Buff> {
        std::mem::take(&mut self.buffs).into_values().collect()
    }

    /// Remove the buffs expired at `now`.
    pub fn take_expired(&mut self, now: DateTime<Utc>) -> Vec<Buff> {
        let expired: Vec<i32> = self
            .buffs
            .values()
            .filter(|b| b.is_expired(now))
            .map(Buff::source_id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.buffs.remove(&id))
            .collect()
    }
}
