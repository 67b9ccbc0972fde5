//! Per-account cash-shop currency.
//!
//! A wallet holds three balances (credit, points and prepaid) for one
//! account of one tenant. Adjustments never take a balance below zero.

pub mod consumer;
pub mod events;
pub mod model;
pub mod processor;
pub mod rest;
pub mod store;

pub use consumer::WalletCommandHandler;
pub use model::{Currency, Wallet};
pub use processor::WalletProcessor;
