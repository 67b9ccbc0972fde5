//! # Atlas Redpanda
//!
//! Kafka-compatible adapters for the Atlas envelope.
//!
//! - [`KafkaProducer`] implements [`atlas_core::producer::Producer`]: every
//!   record is keyed by its big-endian entity id and carries the tenant and
//!   `traceparent` headers of the unit of work that staged it.
//! - [`KafkaConsumer`] subscribes to every topic routed by a
//!   [`Dispatcher`], turns each record into a [`Delivery`] and commits the
//!   offset once the dispatcher has run.
//!
//! # Delivery Guarantees
//!
//! Offsets are committed manually after dispatch (`enable.auto.commit=false`),
//! giving at-least-once delivery. A crash between dispatch and commit causes
//! redelivery, so handlers must be idempotent. Handler failures are logged by
//! the dispatcher and the record is still committed.
//!
//! # Example
//!
//! ```no_run
//! use atlas_core::consumer::Dispatcher;
//! use atlas_redpanda::{KafkaConsumer, KafkaProducer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let producer = KafkaProducer::builder()
//!     .brokers("localhost:9092")
//!     .producer_acks("all")
//!     .build()?;
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
//! let consumer = KafkaConsumer::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("atlas-parties")
//!     .build(&Dispatcher::new())?;
//! tokio::spawn(consumer.run(shutdown_rx));
//! # drop(shutdown_tx);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use atlas_core::consumer::{Delivery, Dispatcher};
use atlas_core::envelope::Headers;
use atlas_core::error::{Error, Result};
use atlas_core::message::Message as Record;
use atlas_core::producer::{ProduceFuture, Producer, ProducerError};
use futures::StreamExt;
use rdkafka::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Header, Headers as _, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tokio::sync::broadcast;

/// Producer over `librdkafka`.
///
/// # Configuration
///
/// - **Brokers**: comma-separated bootstrap servers
/// - **Acks**: "0", "1" or "all" (default: "all")
/// - **Compression**: "none", "gzip", "snappy", "lz4", "zstd" (default: "none")
/// - **Timeout**: per-record send timeout (default: 5 seconds)
pub struct KafkaProducer {
    producer: FutureProducer,
    timeout: Duration,
}

impl std::fmt::Debug for KafkaProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaProducer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl KafkaProducer {
    /// Producer with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError::ConnectionFailed`] if the client cannot be
    /// created.
    pub fn new(brokers: &str) -> std::result::Result<Self, ProducerError> {
        Self::builder().brokers(brokers).build()
    }

    /// Start configuring a producer.
    #[must_use]
    pub fn builder() -> KafkaProducerBuilder {
        KafkaProducerBuilder::default()
    }
}

/// Builder for [`KafkaProducer`].
#[derive(Debug, Default)]
pub struct KafkaProducerBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
}

impl KafkaProducerBuilder {
    /// Bootstrap servers, comma-separated.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Acknowledgment mode: "0", "1" or "all".
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Compression codec.
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Per-record send timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the producer.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError::ConnectionFailed`] if brokers are not set or
    /// the configuration is rejected.
    pub fn build(self) -> std::result::Result<KafkaProducer, ProducerError> {
        let brokers = self
            .brokers
            .ok_or_else(|| ProducerError::ConnectionFailed("Brokers not configured".to_string()))?;
        let acks = self.producer_acks.as_deref().unwrap_or("all");
        let compression = self.compression.as_deref().unwrap_or("none");

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", acks)
            .set("compression.type", compression)
            .create()
            .map_err(|e| ProducerError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        tracing::info!(brokers = %brokers, acks, compression, "Kafka producer created");

        Ok(KafkaProducer {
            producer,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
        })
    }
}

/// Convert envelope headers to Kafka headers.
#[must_use]
pub fn kafka_headers(headers: &Headers) -> OwnedHeaders {
    headers.iter().fold(OwnedHeaders::new(), |acc, (key, value)| {
        acc.insert(Header {
            key,
            value: Some(value),
        })
    })
}

impl Producer for KafkaProducer {
    fn produce<'a>(&'a self, topic: &'a str, headers: &'a Headers, messages: &'a [Record]) -> ProduceFuture<'a> {
        Box::pin(async move {
            let kafka_headers = kafka_headers(headers);

            // Sequential sends keep per-key order within the batch.
            for message in messages {
                let record = FutureRecord::to(topic)
                    .payload(&message.value)
                    .key(&message.key)
                    .headers(kafka_headers.clone());

                match self.producer.send(record, Timeout::After(self.timeout)).await {
                    Ok((partition, offset)) => {
                        tracing::debug!(topic, partition, offset, "record produced");
                    }
                    Err((kafka_error, _)) => {
                        tracing::error!(topic, error = %kafka_error, "failed to produce record");
                        return Err(ProducerError::PublishFailed {
                            topic: topic.to_string(),
                            reason: kafka_error.to_string(),
                        });
                    }
                }
            }
            Ok(())
        })
    }
}

/// Build a [`Delivery`] from a consumed Kafka message.
///
/// Headers with non-UTF-8 or empty values are dropped. A missing payload
/// becomes an empty one.
pub fn to_delivery<M: Message>(message: &M) -> Delivery {
    let headers = message
        .headers()
        .map(|hs| {
            hs.iter()
                .filter_map(|h| {
                    let value = std::str::from_utf8(h.value?).ok()?;
                    Some((h.key.to_string(), value.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    Delivery {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        headers,
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
    }
}

/// Consumer that feeds a [`Dispatcher`].
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    dispatcher: Dispatcher,
    group: String,
}

impl std::fmt::Debug for KafkaConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaConsumer")
            .field("group", &self.group)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl KafkaConsumer {
    /// Start configuring a consumer.
    #[must_use]
    pub fn builder() -> KafkaConsumerBuilder {
        KafkaConsumerBuilder::default()
    }

    /// Consume until `shutdown` fires or its sender is dropped.
    ///
    /// Each record is dispatched and then committed asynchronously.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut stream = self.consumer.stream();
        tracing::info!(group = %self.group, topics = ?self.dispatcher.topics(), "consumer started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(group = %self.group, "consumer stopping");
                    break;
                }
                next = stream.next() => {
                    let Some(result) = next else {
                        tracing::warn!(group = %self.group, "consumer stream ended");
                        break;
                    };
                    match result {
                        Ok(message) => {
                            let delivery = to_delivery(&message);
                            let handled = self.dispatcher.dispatch(&delivery).await;
                            tracing::trace!(
                                topic = %delivery.topic,
                                partition = delivery.partition,
                                offset = delivery.offset,
                                handled,
                                "record dispatched"
                            );
                            if let Err(e) = self.consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    topic = %delivery.topic,
                                    partition = delivery.partition,
                                    offset = delivery.offset,
                                    error = %e,
                                    "Failed to commit offset (message may be redelivered)"
                                );
                            }
                        }
                        Err(e) => {
                            metrics::counter!("atlas_consumer_errors_total", "group" => self.group.clone()).increment(1);
                            tracing::error!(group = %self.group, error = %e, "failed to receive message");
                        }
                    }
                }
            }
        }
    }
}

/// Builder for [`KafkaConsumer`].
#[derive(Debug, Default)]
pub struct KafkaConsumerBuilder {
    brokers: Option<String>,
    consumer_group: Option<String>,
    auto_offset_reset: Option<String>,
}

impl KafkaConsumerBuilder {
    /// Bootstrap servers, comma-separated.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Consumer group id. Defaults to one derived from the routed topics.
    #[must_use]
    pub fn consumer_group(mut self, group: impl Into<String>) -> Self {
        self.consumer_group = Some(group.into());
        self
    }

    /// Where new groups start reading: "earliest" or "latest" (default).
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Create the consumer and subscribe it to the dispatcher's topics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Downstream`] if brokers are missing, the dispatcher
    /// routes nothing, or the client rejects the configuration.
    pub fn build(self, dispatcher: &Dispatcher) -> Result<KafkaConsumer> {
        let brokers = self
            .brokers
            .ok_or_else(|| Error::downstream("kafka", "Brokers not configured"))?;
        let topics = dispatcher.topics();
        if topics.is_empty() {
            return Err(Error::downstream("kafka", "no topics routed"));
        }
        let group = self
            .consumer_group
            .unwrap_or_else(|| default_group(&topics));
        let auto_offset_reset = self.auto_offset_reset.unwrap_or_else(|| "latest".to_string());

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| Error::downstream("kafka", format!("Failed to create consumer: {e}")))?;

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| Error::downstream("kafka", format!("Failed to subscribe to topics: {e}")))?;

        tracing::info!(
            topics = ?topics,
            consumer_group = %group,
            auto_offset_reset = %auto_offset_reset,
            manual_commit = true,
            "Subscribed to topics"
        );

        Ok(KafkaConsumer {
            consumer,
            dispatcher: dispatcher.clone(),
            group,
        })
    }
}

/// Group id for an unnamed consumer: `atlas-` followed by the sorted topics.
fn default_group(topics: &[String]) -> String {
    let mut sorted = topics.to_vec();
    sorted.sort();
    format!("atlas-{}", sorted.join("-"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use atlas_core::envelope::{TENANT_ID, context_from_headers, entity_key};
    use atlas_testing::test_context;
    use rdkafka::Timestamp;
    use rdkafka::message::OwnedMessage;

    #[test]
    fn kafka_producer_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<KafkaProducer>();
        assert_sync::<KafkaProducer>();
    }

    #[test]
    fn producer_requires_brokers() {
        let err = KafkaProducer::builder().build().unwrap_err();
        assert!(matches!(err, ProducerError::ConnectionFailed(_)));
    }

    #[test]
    fn consumer_requires_routes() {
        let err = KafkaConsumer::builder()
            .brokers("localhost:9092")
            .build(&Dispatcher::new())
            .unwrap_err();
        assert!(matches!(err, Error::Downstream { service: "kafka", .. }));
    }

    #[test]
    fn default_group_is_stable() {
        let topics = vec!["b".to_string(), "a".to_string()];
        assert_eq!(default_group(&topics), "atlas-a-b");
    }

    #[test]
    fn consumed_headers_rebuild_tenant() {
        let ctx = test_context();
        let headers = Headers::from_context(&ctx);
        let message = OwnedMessage::new(
            Some(br#"{"type":"CREATED"}"#.to_vec()),
            Some(entity_key(7)),
            "EVENT_TOPIC_PARTY_STATUS".to_string(),
            Timestamp::NotAvailable,
            3,
            42,
            Some(kafka_headers(&headers)),
        );

        let delivery = to_delivery(&message);

        assert_eq!(delivery.partition, 3);
        assert_eq!(delivery.offset, 42);
        assert_eq!(delivery.key, Some(vec![0, 0, 0, 7]));
        assert_eq!(delivery.kind().as_deref(), Some("CREATED"));
        assert_eq!(
            delivery.headers.get(TENANT_ID),
            Some(ctx.tenant().id().to_string().as_str())
        );
        let rebuilt = context_from_headers(&delivery.headers).unwrap();
        assert_eq!(rebuilt.tenant(), ctx.tenant());
        assert_eq!(rebuilt.span().trace_id(), ctx.span().trace_id());
    }

    #[test]
    fn missing_payload_and_headers_are_empty() {
        let message = OwnedMessage::new(
            None,
            None,
            "t".to_string(),
            Timestamp::NotAvailable,
            0,
            0,
            None,
        );
        let delivery = to_delivery(&message);
        assert!(delivery.payload.is_empty());
        assert!(delivery.key.is_none());
        assert_eq!(delivery.headers, Headers::new());
    }
}
