//! Subscription registry
//!
//! Maps a topic name to the connections subscribed to it, each with the
//! encoding deliveries to that connection must use. A (topic, connection)
//! pair appears at most once; subscribing again only refreshes the encoding.
//!
//! Routing is by prefix: a subscription to `sensors` matches publishes to
//! `sensors`, `sensors/temp` and anything else starting with `sensors`.

use std::collections::{HashMap, HashSet};

use crate::broker::session::ConnectionId;
use crate::protocol::Encoding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscriber {
    pub connection: ConnectionId,
    pub encoding: Encoding,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    topics: HashMap<String, Vec<Subscriber>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `connection` to `topic`. Returns false if it was already subscribed.
    pub fn subscribe(&mut self, topic: &str, connection: ConnectionId, encoding: Encoding) -> bool {
        let subscribers = self.topics.entry(topic.to_string()).or_default();
        match subscribers.iter_mut().find(|s| s.connection == connection) {
            Some(existing) => {
                existing.encoding = encoding;
                false
            }
            None => {
                subscribers.push(Subscriber {
                    connection,
                    encoding,
                });
                true
            }
        }
    }

    /// Remove `connection` from `topic`. Missing entries are not an error.
    pub fn unsubscribe(&mut self, topic: &str, connection: ConnectionId) -> bool {
        let Some(subscribers) = self.topics.get_mut(topic) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|s| s.connection != connection);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    /// Drop every subscription held by `connection`, returning how many were removed.
    pub fn unsubscribe_all(&mut self, connection: ConnectionId) -> usize {
        let mut removed = 0;
        self.topics.retain(|_, subscribers| {
            let before = subscribers.len();
            subscribers.retain(|s| s.connection != connection);
            removed += before - subscribers.len();
            !subscribers.is_empty()
        });
        removed
    }

    /// Everyone who should receive a publish to `published`.
    ///
    /// Collects the subscribers of every registered topic that is a prefix of
    /// `published`. A connection matching through several topics appears once,
    /// with the encoding stored on its longest matching subscription.
    pub fn subscribers_matching(&self, published: &str) -> Vec<Subscriber> {
        let mut matching: Vec<(&String, &Vec<Subscriber>)> = self
            .topics
            .iter()
            .filter(|(topic, _)| published.starts_with(topic.as_str()))
            .collect();
        matching.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut seen = HashSet::new();
        matching
            .into_iter()
            .flat_map(|(_, subscribers)| subscribers.iter().copied())
            .filter(|s| seen.insert(s.connection))
            .collect()
    }

    /// Subscribers registered on exactly `topic`.
    pub fn subscribers(&self, topic: &str) -> &[Subscriber] {
        self.topics.get(topic).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_subscribed(&self, topic: &str, connection: ConnectionId) -> bool {
        self.subscribers(topic)
            .iter()
            .any(|s| s.connection == connection)
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}
