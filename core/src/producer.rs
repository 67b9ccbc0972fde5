//! Producer abstraction over the Kafka-compatible broker.
//!
//! [`emit`](crate::emit) flushes a [`MessageBuffer`](crate::message::MessageBuffer)
//! through a [`Producer`]. Production uses the rdkafka implementation in
//! `atlas-redpanda`; tests use the recording doubles in `atlas-testing`.

use crate::envelope::Headers;
use crate::message::Message;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from producing records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The broker rejected or timed out a record
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// A staged provider could not produce its records
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Future returned by [`Producer::produce`].
pub type ProduceFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ProducerError>> + Send + 'a>>;

/// Writes keyed records to a topic.
///
/// Records of one call must be produced in slice order. Implementations are
/// shared across handlers and must be `Send + Sync`.
///
/// # Dyn Compatibility
///
/// Returns a boxed future so processors can hold `Arc<dyn Producer>`.
pub trait Producer: Send + Sync {
    /// Produce `messages` to `topic` with `headers` on every record.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError::PublishFailed`] if any record fails.
    fn produce<'a>(&'a self, topic: &'a str, headers: &'a Headers, messages: &'a [Message]) -> ProduceFuture<'a>;
}
