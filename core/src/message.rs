//! Per-request staging area for outbound Kafka records.
//!
//! Processors stage status events on a [`MessageBuffer`] while they mutate
//! state. Staged providers are thunks: nothing is serialized until the buffer
//! is flushed, and a buffer dropped on failure costs only the staging.
//!
//! Topics keep their first-staged order and records within a topic keep
//! insertion order. No order is defined across topics.

use crate::envelope::entity_key;
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One encoded Kafka record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Partition key (big-endian entity id)
    pub key: Vec<u8>,
    /// Serialized value
    pub value: Vec<u8>,
}

impl Message {
    /// Build a record.
    #[must_use]
    pub const fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    /// Decode the value as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not valid JSON for `T`.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.value)?)
    }
}

/// Deferred record source, evaluated at flush time.
pub type Provider = Box<dyn Fn() -> Result<Vec<Message>> + Send + Sync>;

/// Topic-ordered staging of providers.
#[derive(Default)]
pub struct MessageBuffer {
    topics: Vec<(String, Vec<Provider>)>,
}

impl MessageBuffer {
    /// Empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `provider` on `topic`.
    pub fn put(&mut self, topic: impl Into<String>, provider: Provider) {
        let topic = topic.into();
        match self.topics.iter_mut().find(|(t, _)| *t == topic) {
            Some((_, providers)) => providers.push(provider),
            None => self.topics.push((topic, vec![provider])),
        }
    }

    /// Stage a JSON event keyed by `key`.
    ///
    /// `event` is moved into the buffer, so later changes by the caller are
    /// not observed. Serialization happens at flush.
    pub fn put_json<T>(&mut self, topic: impl Into<String>, key: u32, event: T)
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.put(
            topic,
            Box::new(move || Ok(vec![Message::new(entity_key(key), serde_json::to_vec(&event)?)])),
        );
    }

    /// Number of staged providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.iter().map(|(_, p)| p.len()).sum()
    }

    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Topics in first-staged order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|(t, _)| t.as_str())
    }

    /// Providers staged on `topic`.
    #[must_use]
    pub fn staged(&self, topic: &str) -> usize {
        self.topics
            .iter()
            .find(|(t, _)| t == topic)
            .map_or(0, |(_, p)| p.len())
    }

    /// Evaluate every provider and group records by topic.
    ///
    /// # Errors
    ///
    /// The first provider error.
    pub fn get_all(&self) -> Result<BTreeMap<String, Vec<Message>>> {
        let mut out = BTreeMap::new();
        for (topic, records) in self.evaluate()? {
            out.insert(topic, records);
        }
        Ok(out)
    }

    /// Evaluate every provider, keeping topic order.
    ///
    /// # Errors
    ///
    /// The first provider error.
    pub fn evaluate(&self) -> Result<Vec<(String, Vec<Message>)>> {
        self.topics
            .iter()
            .map(|(topic, providers)| {
                let mut records = Vec::new();
                for provider in providers {
                    records.extend(provider()?);
                }
                Ok((topic.clone(), records))
            })
            .collect()
    }

    /// Move everything staged in `other` to the end of this buffer.
    pub fn append(&mut self, other: Self) {
        for (topic, providers) in other.topics {
            for provider in providers {
                self.put(topic.clone(), provider);
            }
        }
    }
}

impl fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.topics.iter().map(|(t, p)| (t, p.len())))
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn keeps_topic_and_insertion_order() {
        let mut buffer = MessageBuffer::new();
        buffer.put_json("party-status", 1, json!({"n": 1}));
        buffer.put_json("buff-status", 9, json!({"n": 2}));
        buffer.put_json("party-status", 2, json!({"n": 3}));

        assert_eq!(buffer.topics().collect::<Vec<_>>(), vec!["party-status", "buff-status"]);
        assert_eq!(buffer.staged("party-status"), 2);
        assert_eq!(buffer.len(), 3);

        let all = buffer.get_all().unwrap();
        let party: Vec<Value> = all["party-status"].iter().map(|m| m.decode().unwrap()).collect();
        assert_eq!(party, vec![json!({"n": 1}), json!({"n": 3})]);
        assert_eq!(all["party-status"][1].key, vec![0, 0, 0, 2]);
    }

    #[test]
    fn providers_are_deferred() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut buffer = MessageBuffer::new();
        let seen = Arc::clone(&calls);
        buffer.put(
            "t",
            Box::new(move || {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(vec![Message::new(vec![], b"{}".to_vec())])
            }),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        buffer.evaluate().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn put_json_snapshots_value() {
        let mut buffer = MessageBuffer::new();
        let mut members = vec![1, 2];
        buffer.put_json("t", 1, members.clone());
        members.push(3);

        let all = buffer.get_all().unwrap();
        let staged: Vec<u32> = all["t"][0].decode().unwrap();
        assert_eq!(staged, vec![1, 2]);
    }

    #[test]
    fn append_preserves_order() {
        let mut a = MessageBuffer::new();
        a.put_json("t", 1, 1);
        let mut b = MessageBuffer::new();
        b.put_json("t", 2, 2);
        b.put_json("u", 3, 3);
        a.append(b);

        let all = a.get_all().unwrap();
        assert_eq!(all["t"].len(), 2);
        assert_eq!(all["u"].len(), 1);
    }
}
