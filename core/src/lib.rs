//! # Atlas Core
//!
//! Shared building blocks of the Atlas game-server services.
//!
//! - [`tenant`] / [`context`]: the ambient tenant, span and cancellation
//!   carried by every operation
//! - [`registry`]: typed tenant-keyed stores with secondary indexes and
//!   monotonic id allocation
//! - [`message`] / [`emit`]: the per-request buffer of status events and the
//!   unit of work that produces it only on success
//! - [`envelope`] / [`producer`] / [`consumer`]: Kafka key, header and
//!   dispatch conventions
//! - [`error`]: the error taxonomy every processor reports in
//!
//! ## Example
//!
//! ```ignore
//! use atlas_core::{Context, emit::emit};
//!
//! let ctx = Context::new(tenant);
//! let party = emit(&*producer, &ctx, |mut buffer| async move {
//!     let result = parties.create(&ctx, &mut buffer, leader_id).await;
//!     (buffer, result)
//! })
//! .await?;
//! ```

pub mod consumer;
pub mod context;
pub mod emit;
pub mod envelope;
pub mod error;
pub mod message;
pub mod producer;
pub mod registry;
pub mod tenant;
pub mod topic;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use context::{Context, SpanContext};
pub use error::{Error, Result};
pub use message::{Message, MessageBuffer};
pub use tenant::Tenant;

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    ///
    /// // Test - fixed time for deterministic tests
    /// let clock = atlas_testing::test_clock();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
