//! # Atlas Login History
//!
//! Append-only record of login attempts per tenant. Entries older than the
//! retention window (90 days unless configured) are purged by
//! [`PurgeSweep`], which spans every tenant.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumer;
pub mod events;
pub mod model;
pub mod processor;
pub mod rest;
pub mod store;
pub mod sweep;

pub use consumer::SessionStatusHandler;
pub use model::{Attempt, DEFAULT_RETENTION_DAYS, LoginEntry};
pub use processor::LoginHistoryProcessor;
pub use sweep::PurgeSweep;
