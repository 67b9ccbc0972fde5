//! # Atlas Server
//!
//! The service process: configuration, the processors and their Kafka
//! consumers, background sweeps, and the REST façade.
//!
//! ```text
//! HTTP ──▶ api::<domain> ──▶ Processor ──▶ registry / Postgres
//!                                   └──▶ MessageBuffer ──▶ Kafka (on success)
//! Kafka ──▶ Dispatcher ──▶ CommandHandler ──▶ Processor
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod routes;
pub mod services;

pub use config::{Config, ConfigError};
pub use routes::{build_router, metrics_router};
pub use services::{Services, registry_backend};
