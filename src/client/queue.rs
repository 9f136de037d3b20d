use std::collections::VecDeque;

use bytes::BytesMut;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::protocol::{Encoding, FrameDecoder, Message, frame_message};
use crate::utils::error::ClientError;

/// Whether a [`Queue`] reads from its topic or only writes to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Subscribes to the topic as soon as it connects.
    Consumer,
    Producer,
}

/// A single connection to the broker bound to one topic and one encoding.
///
/// Every method maps onto exactly one wire command. Publishes that arrive
/// while waiting for a `listTopics` reply are kept and handed out by the
/// next calls to [`Queue::pull`].
#[derive(Debug)]
pub struct Queue {
    topic: String,
    encoding: Encoding,
    kind: QueueKind,
    stream: TcpStream,
    decoder: FrameDecoder,
    buf: BytesMut,
    pending: VecDeque<(String, Value)>,
}

impl Queue {
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        topic: impl Into<String>,
        encoding: Encoding,
        kind: QueueKind,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let mut queue = Self {
            topic: topic.into(),
            encoding,
            kind,
            stream,
            decoder: FrameDecoder::default(),
            buf: BytesMut::new(),
            pending: VecDeque::new(),
        };

        if kind == QueueKind::Consumer {
            let subscribe = Message::subscribe(queue.topic.as_str());
            queue.send(&subscribe).await?;
        }
        Ok(queue)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Publish `value` to the queue's topic. Strings, numbers and any other
    /// JSON value are accepted.
    pub async fn push(&mut self, value: impl Into<Value>) -> Result<(), ClientError> {
        let publish = Message::publish(self.topic.as_str(), value);
        self.send(&publish).await
    }

    /// Wait for the next delivered publish. `None` once the broker has closed
    /// the connection.
    pub async fn pull(&mut self) -> Result<Option<(String, Value)>, ClientError> {
        if let Some(delivery) = self.pending.pop_front() {
            return Ok(Some(delivery));
        }
        loop {
            match self.recv().await? {
                None => return Ok(None),
                Some(Message::Publish { topic, message }) => return Ok(Some((topic, message))),
                Some(other) => debug!(command = other.command(), "ignoring reply while pulling"),
            }
        }
    }

    /// Ask the broker for every topic that currently holds a value.
    pub async fn list_topics(&mut self) -> Result<Vec<String>, ClientError> {
        self.send(&Message::ListTopics).await?;
        loop {
            match self.recv().await? {
                None => return Err(ClientError::Closed),
                Some(Message::ListTopicsResult { topics }) => return Ok(topics),
                Some(Message::Publish { topic, message }) => {
                    self.pending.push_back((topic, message));
                }
                Some(other) => debug!(command = other.command(), "ignoring unexpected message"),
            }
        }
    }

    /// Stop receiving the queue's topic.
    pub async fn cancel(&mut self) -> Result<(), ClientError> {
        let unsubscribe = Message::unsubscribe(self.topic.as_str());
        self.send(&unsubscribe).await
    }

    async fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        let frame = frame_message(self.encoding, message)?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Message>, ClientError> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.buf)? {
                let encoding = Encoding::from_tag(frame.tag)?;
                return Ok(Some(encoding.decode(&frame.payload)?));
            }
            if self.stream.read_buf(&mut self.buf).await? == 0 {
                return Ok(None);
            }
        }
    }
}
