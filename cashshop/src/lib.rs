//! # Atlas Cash Shop
//!
//! Cash-shop assets stored in Postgres. Each asset carries a cash id that is
//! unique across every tenant and an expiration derived from the period of
//! the commodity it was bought as:
//!
//! - period `0` is permanent
//! - period `1` honours a per-tenant hourly override for listed templates
//! - anything else expires `period` days after creation
//!
//! [`ExpirationSweep`] removes due assets on an interval.
//!
//! The [`wallet`] module keeps the credit, points and prepaid balances of
//! each account.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod commodity;
pub mod consumer;
pub mod events;
pub mod model;
pub mod processor;
pub mod rest;
pub mod store;
pub mod sweep;
pub mod wallet;

pub use commodity::{CommodityCatalog, HttpCommodityCatalog, MemoryCommodityCatalog};
pub use consumer::CommandHandler;
pub use model::{Asset, HourlyExpirations, NewAsset};
pub use processor::CashAssetProcessor;
pub use sweep::ExpirationSweep;
pub use wallet::{Currency, Wallet, WalletCommandHandler, WalletProcessor};
