//! # Atlas Fame
//!
//! Characters of level 15 or more may give one fame per day, and may not
//! fame the same character twice within a month. Accepted requests are
//! logged in `fame_logs` and forwarded to the character service as a
//! `REQUEST_CHANGE_FAME` command; rejected ones produce an `ERROR` event
//! for the giver.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod character;
pub mod consumer;
pub mod events;
pub mod model;
pub mod processor;
pub mod rest;
pub mod store;

pub use character::{CharacterDirectory, CharacterInfo, HttpCharacterDirectory, MemoryCharacterDirectory};
pub use consumer::{CharacterStatusHandler, CommandHandler};
pub use model::{FameLog, Field};
pub use processor::FameProcessor;
