//! Broker engine
//!
//! Owns the topic store and the subscription registry and turns each decoded
//! command into its pub/sub side effect:
//!
//! - `subscribe`: register, then send the retained value (if any) to the subscriber
//! - `publish`: store the value, then fan it out to every matching subscriber,
//!   re-encoded for each recipient's own encoding
//! - `unsubscribe`: deregister, no reply
//! - `listTopics`: reply to the requester with every topic holding a value
//!
//! The engine never touches sockets. Connections are reached through the
//! [`Peers`] table by identity only, and a failed delivery is reported back as
//! an unreachable connection instead of aborting the rest of the fan-out.
//!
//! All methods take `&mut self` and are meant to be driven from a single
//! event-loop task, which is what serializes every state mutation.

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, warn};

use crate::broker::session::{ConnectionId, Session};
use crate::broker::subscription::SubscriptionRegistry;
use crate::broker::topic::TopicStore;
use crate::protocol::{Encoding, Frame, Message, ProtocolError, frame_message};
use crate::utils::error::DeliveryError;

/// The live connections, as seen by the engine.
pub trait Peers {
    fn session_mut(&mut self, id: ConnectionId) -> Option<&mut Session>;

    /// Queue an already framed message for `to`.
    fn deliver(&mut self, to: ConnectionId, frame: Bytes) -> Result<(), DeliveryError>;
}

#[derive(Debug, Default)]
pub struct Broker {
    topics: TopicStore,
    subscriptions: SubscriptionRegistry,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topics(&self) -> &TopicStore {
        &self.topics
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    /// Handle one raw frame received from `from`.
    ///
    /// An `Err` is a protocol violation: the caller must tear the connection
    /// down. `Ok` carries the connections that could not be reached while
    /// delivering, which the caller must tear down as well.
    pub fn on_frame<P: Peers>(
        &mut self,
        from: ConnectionId,
        frame: &Frame,
        peers: &mut P,
    ) -> Result<Vec<ConnectionId>, ProtocolError> {
        let Some(session) = peers.session_mut(from) else {
            debug!(connection = %from, "dropping frame from a closed connection");
            return Ok(Vec::new());
        };
        let encoding = session.identify(frame.tag)?;
        let message = encoding.decode(&frame.payload)?;
        self.dispatch(from, encoding, message, peers)
    }

    /// Apply an already decoded command from an active connection.
    pub fn dispatch<P: Peers>(
        &mut self,
        from: ConnectionId,
        encoding: Encoding,
        message: Message,
        peers: &mut P,
    ) -> Result<Vec<ConnectionId>, ProtocolError> {
        match message {
            Message::Subscribe { topic } => Ok(self.subscribe(from, encoding, &topic, peers)),
            Message::Publish { topic, message } => Ok(self.publish(&topic, message, peers)),
            Message::Unsubscribe { topic } => {
                let removed = self.subscriptions.unsubscribe(&topic, from);
                debug!(connection = %from, %topic, removed, "unsubscribe");
                Ok(Vec::new())
            }
            Message::ListTopics => Ok(self.list_topics(from, encoding, peers)),
            Message::ListTopicsResult { .. } => {
                Err(ProtocolError::UnexpectedCommand("listTopics results"))
            }
        }
    }

    /// Register the subscription and catch the subscriber up on the retained value.
    pub fn subscribe<P: Peers>(
        &mut self,
        from: ConnectionId,
        encoding: Encoding,
        topic: &str,
        peers: &mut P,
    ) -> Vec<ConnectionId> {
        let added = self.subscriptions.subscribe(topic, from, encoding);
        debug!(connection = %from, %topic, %encoding, added, "subscribe");

        let Some(value) = self.topics.get(topic) else {
            return Vec::new();
        };
        let retained = Message::publish(topic, value.clone());
        send(peers, from, encoding, &retained).into_iter().collect()
    }

    /// Store `value` as the retained value of `topic` and fan it out.
    pub fn publish<P: Peers>(
        &mut self,
        topic: &str,
        value: Value,
        peers: &mut P,
    ) -> Vec<ConnectionId> {
        let message = Message::publish(topic, value.clone());
        self.topics.put(topic, value);

        let recipients = self.subscriptions.subscribers_matching(topic);
        debug!(%topic, recipients = recipients.len(), "publish");

        let mut frames: HashMap<Encoding, Option<Bytes>> = HashMap::new();
        let mut unreachable = Vec::new();
        for subscriber in recipients {
            let frame = frames
                .entry(subscriber.encoding)
                .or_insert_with(|| render(subscriber.encoding, &message))
                .clone();
            let Some(frame) = frame else {
                debug!(connection = %subscriber.connection, %topic, "no frame for this encoding");
                continue;
            };
            if let Err(err) = peers.deliver(subscriber.connection, frame) {
                warn!(connection = %subscriber.connection, %topic, error = %err, "delivery failed");
                unreachable.push(subscriber.connection);
            }
        }
        unreachable
    }

    pub fn list_topics<P: Peers>(
        &mut self,
        from: ConnectionId,
        encoding: Encoding,
        peers: &mut P,
    ) -> Vec<ConnectionId> {
        let reply = Message::ListTopicsResult {
            topics: self.topics.list(),
        };
        send(peers, from, encoding, &reply).into_iter().collect()
    }

    /// Purge every subscription held by a connection that is going away.
    pub fn disconnect(&mut self, id: ConnectionId) -> usize {
        self.subscriptions.unsubscribe_all(id)
    }
}

/// Frame `message` for one recipient. Returns the recipient if it was unreachable.
fn send<P: Peers>(
    peers: &mut P,
    to: ConnectionId,
    encoding: Encoding,
    message: &Message,
) -> Option<ConnectionId> {
    let frame = render(encoding, message)?;
    match peers.deliver(to, frame) {
        Ok(()) => None,
        Err(err) => {
            warn!(connection = %to, command = message.command(), error = %err, "delivery failed");
            Some(to)
        }
    }
}

fn render(encoding: Encoding, message: &Message) -> Option<Bytes> {
    match frame_message(encoding, message) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(
                %encoding,
                command = message.command(),
                error = %err,
                "message cannot be framed, skipping"
            );
            None
        }
    }
}
