//! # Atlas Messengers
//!
//! Three-seat messenger rooms. Each member holds a slot; a joining character
//! takes the lowest free one and the room closes when the last member
//! leaves.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumer;
pub mod events;
pub mod model;
pub mod processor;
pub mod rest;

pub use consumer::{CharacterStatusHandler, CommandHandler};
pub use model::{CAPACITY, Member, Messenger};
pub use processor::{MessengerProcessor, registry};
