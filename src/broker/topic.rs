//! Topic store
//!
//! Holds the retained (most recently published) value of every topic. A topic
//! exists here only once something has been published to it, so the store
//! never carries empty entries and `list` is exactly "topics with a value".
//!
//! Writes are last-write-wins with no versioning. Values are opaque: an empty
//! string or a `null` is a valid retained value and is distinct from a topic
//! that was never published.

use std::collections::BTreeMap;

use serde_json::Value;

#[derive(Debug, Default)]
pub struct TopicStore {
    retained: BTreeMap<String, Value>,
}

impl TopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retained value of `topic`, if it was ever published.
    pub fn get(&self, topic: &str) -> Option<&Value> {
        self.retained.get(topic)
    }

    /// Overwrite the retained value of `topic`, returning the previous one.
    pub fn put(&mut self, topic: &str, value: Value) -> Option<Value> {
        self.retained.insert(topic.to_string(), value)
    }

    /// Snapshot of every topic with a retained value, ordered by name.
    pub fn list(&self) -> Vec<String> {
        self.retained.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }
}
