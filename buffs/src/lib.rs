//! # Atlas Buffs
//!
//! Per-character buffs keyed by source id. Re-applying a source replaces
//! the previous buff, an active `HOLY_SHIELD` blocks diseases, and
//! [`ExpirationSweep`] removes expired buffs in the background.
//! [`PoisonSweep`] turns active `POISON` changes into `CHANGE_HP` commands
//! once per [`POISON_TICK`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumer;
pub mod events;
pub mod model;
pub mod processor;
pub mod rest;
pub mod sweep;

pub use consumer::CommandHandler;
pub use model::{Buff, Character, DISEASES, HOLY_SHIELD, POISON, StatChange};
pub use processor::{BuffProcessor, POISON_TICK, Poisoned, poison_registry, registry};
pub use sweep::{ExpirationSweep, PoisonSweep};
