//! # Atlas Testing
//!
//! Test doubles and helpers for Atlas services.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - Producers that record or reject records ([`RecordingProducer`],
//!   [`FailingProducer`])
//! - Tenant and context fixtures
//!
//! ## Example
//!
//! ```ignore
//! use atlas_testing::{RecordingProducer, test_context};
//!
//! #[tokio::test]
//! async fn leader_leaving_disbands() {
//!     let producer = Arc::new(RecordingProducer::new());
//!     let ctx = test_context();
//!     // ... run the processor ...
//!     let events: Vec<serde_json::Value> = producer.events("EVENT_TOPIC_PARTY_STATUS");
//!     assert_eq!(events[0]["type"], "DISBANDED");
//! }
//! ```

use atlas_core::environment::Clock;
use chrono::{DateTime, Utc};

/// Mock implementations of injected dependencies.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use atlas_testing::mocks::FixedClock;
    /// use atlas_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which never happens.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can hold one handle while the
    /// processor under test holds another.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Clock starting at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Jump to `time`.
        ///
        /// # Panics
        ///
        /// Panics if a previous holder panicked while setting the time.
        #[allow(clippy::unwrap_used)]
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap() = time;
        }

        /// Move forward by `by`.
        ///
        /// # Panics
        ///
        /// Panics if a previous holder panicked while setting the time.
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap();
            *time += by;
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }
}

/// Producer doubles.
pub mod producers {
    use atlas_core::envelope::{Headers, parse_entity_key};
    use atlas_core::message::Message;
    use atlas_core::producer::{ProduceFuture, Producer, ProducerError};
    use serde::de::DeserializeOwned;
    use std::sync::Mutex;

    /// One produced record.
    #[derive(Debug, Clone)]
    pub struct Produced {
        /// Topic
        pub topic: String,
        /// Headers sent with the record
        pub headers: Headers,
        /// Key and value
        pub message: Message,
    }

    impl Produced {
        /// Entity id decoded from the key.
        #[must_use]
        pub fn key(&self) -> Option<u32> {
            parse_entity_key(&self.message.key)
        }
    }

    /// Producer that keeps every record in memory.
    #[derive(Debug, Default)]
    pub struct RecordingProducer {
        records: Mutex<Vec<Produced>>,
    }

    impl RecordingProducer {
        /// Empty recorder.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Every record, in production order.
        ///
        /// # Panics
        ///
        /// Panics if the record list is poisoned.
        #[must_use]
        #[allow(clippy::unwrap_used)]
        pub fn records(&self) -> Vec<Produced> {
            self.records.lock().unwrap().clone()
        }

        /// Records produced to `topic`.
        #[must_use]
        pub fn on_topic(&self, topic: &str) -> Vec<Produced> {
            self.records().into_iter().filter(|r| r.topic == topic).collect()
        }

        /// Values produced to `topic`, decoded as JSON.
        ///
        /// # Panics
        ///
        /// Panics if a value does not decode as `T`.
        #[must_use]
        #[allow(clippy::unwrap_used)]
        pub fn events<T: DeserializeOwned>(&self, topic: &str) -> Vec<T> {
            self.on_topic(topic)
                .iter()
                .map(|r| r.message.decode().unwrap())
                .collect()
        }

        /// Number of records produced.
        #[must_use]
        pub fn len(&self) -> usize {
            self.records().len()
        }

        /// Whether nothing was produced.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Forget recorded records.
        ///
        /// # Panics
        ///
        /// Panics if the record list is poisoned.
        #[allow(clippy::unwrap_used)]
        pub fn clear(&self) {
            self.records.lock().unwrap().clear();
        }
    }

    impl Producer for RecordingProducer {
        fn produce<'a>(&'a self, topic: &'a str, headers: &'a Headers, messages: &'a [Message]) -> ProduceFuture<'a> {
            Box::pin(async move {
                let mut records = self
                    .records
                    .lock()
                    .map_err(|e| ProducerError::ConnectionFailed(e.to_string()))?;
                records.extend(messages.iter().map(|m| Produced {
                    topic: topic.to_string(),
                    headers: headers.clone(),
                    message: m.clone(),
                }));
                Ok(())
            })
        }
    }

    /// Producer whose every call fails.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct FailingProducer;

    impl Producer for FailingProducer {
        fn produce<'a>(&'a self, topic: &'a str, _headers: &'a Headers, _messages: &'a [Message]) -> ProduceFuture<'a> {
            Box::pin(async move {
                Err(ProducerError::PublishFailed {
                    topic: topic.to_string(),
                    reason: "broker unavailable".into(),
                })
            })
        }
    }
}

/// Tenant and context fixtures.
pub mod helpers {
    use atlas_core::{Context, Tenant};
    use uuid::Uuid;

    /// A fresh `GMS 83.1` tenant.
    ///
    /// # Panics
    ///
    /// Never: the region is valid.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_tenant() -> Tenant {
        Tenant::create(Uuid::new_v4(), "GMS", 83, 1).expect("valid tenant")
    }

    /// Context for a fresh tenant.
    #[must_use]
    pub fn test_context() -> Context {
        Context::new(test_tenant())
    }

    /// Install a test subscriber honoring `RUST_LOG`. Safe to call twice.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing strategies.
pub mod properties {
    use proptest::prelude::*;

    /// Character ids in a range small enough to collide.
    pub fn character_id() -> impl Strategy<Value = u32> {
        1u32..32
    }

    /// Sequences of character ids.
    pub fn character_ids(max: usize) -> impl Strategy<Value = Vec<u32>> {
        proptest::collection::vec(character_id(), 0..max)
    }
}

// Re-export commonly used items
pub use helpers::{init_tracing, test_context, test_tenant};
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use producers::{FailingProducer, Produced, RecordingProducer};
