//! # Atlas Runtime
//!
//! Process-level plumbing shared by every Atlas service:
//!
//! - [`sweep`]: long-lived periodic tasks (buff expiration, asset expiration,
//!   login-history purge) that stop on the shutdown broadcast
//! - [`shutdown`]: the shutdown broadcast and task draining
//! - [`metrics`]: Prometheus exporter and metric descriptions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod metrics;
pub mod shutdown;
pub mod sweep;

pub use shutdown::{ShutdownCoordinator, wait_for_signal};
pub use sweep::{Sweep, SweepFuture, spawn_sweep};
