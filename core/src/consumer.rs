//! Consumer-side dispatch.
//!
//! The broker adapter (`atlas-redpanda`) turns each consumed record into a
//! [`Delivery`] and hands it to a [`Dispatcher`]. The dispatcher rebuilds the
//! producer's [`Context`] from the headers and routes the delivery to every
//! [`Handler`] registered for its topic.
//!
//! Delivery is at-least-once. Handlers must tolerate duplicates; their errors
//! are logged and the record is still acknowledged so a poison message never
//! blocks its partition.

use crate::context::Context;
use crate::envelope::{Headers, context_from_headers};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A consumed record.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Source topic
    pub topic: String,
    /// Partition
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Partition key
    pub key: Option<Vec<u8>>,
    /// Record headers
    pub headers: Headers,
    /// Raw value
    pub payload: Vec<u8>,
}

impl Delivery {
    /// Decode the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unexpected`] for malformed payloads.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        decode_json(&self.payload)
    }

    /// The `type` discriminator of the payload, if any.
    #[must_use]
    pub fn kind(&self) -> Option<String> {
        #[derive(serde::Deserialize)]
        struct Tagged {
            #[serde(rename = "type")]
            kind: String,
        }
        serde_json::from_slice::<Tagged>(&self.payload).ok().map(|p| p.kind)
    }
}

/// Decode a JSON payload.
///
/// # Errors
///
/// Returns [`Error::Unexpected`] for malformed payloads.
pub fn decode_json<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(payload)?)
}

/// Future returned by [`Handler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Service-local consumer handler.
pub trait Handler: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Handle one delivery under the producer's tenant.
    ///
    /// # Errors
    ///
    /// Any error; the dispatcher logs it and acknowledges the record.
    fn handle<'a>(&'a self, ctx: Context, delivery: &'a Delivery) -> HandlerFuture<'a>;
}

/// Routes deliveries to handlers by topic.
#[derive(Default, Clone)]
pub struct Dispatcher {
    routes: HashMap<String, Vec<Arc<dyn Handler>>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.routes
                    .iter()
                    .map(|(t, hs)| (t, hs.iter().map(|h| h.name()).collect::<Vec<_>>())),
            )
            .finish()
    }
}

impl Dispatcher {
    /// Empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `topic` to `handler`.
    #[must_use]
    pub fn register(mut self, topic: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.routes.entry(topic.into()).or_default().push(handler);
        self
    }

    /// Every routed topic.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.routes.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Dispatch one delivery.
    ///
    /// Returns the number of handlers that succeeded. A delivery without a
    /// valid tenant is logged and skipped.
    pub async fn dispatch(&self, delivery: &Delivery) -> usize {
        let Some(handlers) = self.routes.get(&delivery.topic) else {
            tracing::debug!(topic = %delivery.topic, "no handler for topic");
            return 0;
        };

        let ctx = match context_from_headers(&delivery.headers) {
            Ok(ctx) => ctx,
            Err(e) => {
                metrics::counter!("atlas_consumer_messages_total", "topic" => delivery.topic.clone(), "outcome" => "skipped")
                    .increment(1);
                tracing::warn!(
                    topic = %delivery.topic,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    error = %e,
                    "skipping message without tenant"
                );
                return 0;
            }
        };

        let mut handled = 0;
        for handler in handlers {
            match handler.handle(ctx.clone(), delivery).await {
                Ok(()) => {
                    handled += 1;
                    metrics::counter!("atlas_consumer_messages_total", "topic" => delivery.topic.clone(), "outcome" => "ok")
                        .increment(1);
                }
                Err(e) => {
                    metrics::counter!("atlas_consumer_messages_total", "topic" => delivery.topic.clone(), "outcome" => "error")
                        .increment(1);
                    log_failure(handler.name(), delivery, &ctx, &e);
                }
            }
        }
        handled
    }
}

fn log_failure(handler: &str, delivery: &Delivery, ctx: &Context, error: &Error) {
    if error.is_precondition() {
        tracing::info!(
            handler,
            topic = %delivery.topic,
            tenant = %ctx.tenant(),
            code = error.code(),
            "command rejected"
        );
    } else {
        tracing::error!(
            handler,
            topic = %delivery.topic,
            partition = delivery.partition,
            offset = delivery.offset,
            tenant = %ctx.tenant(),
            trace_id = ctx.span().trace_id(),
            error = %error,
            "handler failed"
        );
    }
}
