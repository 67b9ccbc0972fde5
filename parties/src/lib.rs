//! # Atlas Parties
//!
//! Parties of up to six characters, stored in a tenant registry indexed by
//! member. A leader leaving disbands the party.
//!
//! ```ignore
//! let processor = PartyProcessor::new(atlas_parties::registry(backend));
//! let party = processor.create_and_emit(&*producer, &ctx, world_id, leader_id).await?;
//! processor.join_and_emit(&*producer, &ctx, party.id(), member_id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumer;
pub mod events;
pub mod model;
pub mod processor;
pub mod rest;

pub use consumer::{CharacterStatusHandler, CommandHandler};
pub use model::{CAPACITY, Party};
pub use processor::{PartyProcessor, registry};
