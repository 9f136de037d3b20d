//! Protocol commands
//!
//! `Message` is the logical command exchanged between clients and the broker.
//! On the wire every encoding carries the same flat record:
//!
//! - `command`: one of `subscribe`, `publish`, `unsubscribe`, `listTopics`
//! - `topic`: target topic (subscribe, publish, unsubscribe)
//! - `message`: published value (publish)
//! - `topics`: topic names (listTopics reply only)
//!
//! A published value is type-erased: any string, number, boolean, null, list
//! or map a client sends is stored and forwarded as is. Encodings that have
//! no native form for structured values carry them as JSON text.

use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::protocol::ProtocolError;

pub const SUBSCRIBE: &str = "subscribe";
pub const PUBLISH: &str = "publish";
pub const UNSUBSCRIBE: &str = "unsubscribe";
pub const LIST_TOPICS: &str = "listTopics";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Subscribe { topic: String },
    Publish { topic: String, message: Value },
    Unsubscribe { topic: String },
    ListTopics,
    ListTopicsResult { topics: Vec<String> },
}

impl Message {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self::Subscribe {
            topic: topic.into(),
        }
    }

    pub fn publish(topic: impl Into<String>, message: impl Into<Value>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Self::Unsubscribe {
            topic: topic.into(),
        }
    }

    /// Wire name of the command.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => SUBSCRIBE,
            Self::Publish { .. } => PUBLISH,
            Self::Unsubscribe { .. } => UNSUBSCRIBE,
            Self::ListTopics | Self::ListTopicsResult { .. } => LIST_TOPICS,
        }
    }
}

/// Flat, encoding-independent shape of a message.
///
/// Serializes as the JSON wire form: absent fields are left out, and an
/// explicit `"message": null` is a null value rather than a missing one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Record {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Text form of a value for encodings without structured values.
///
/// Strings pass through untouched; anything else becomes JSON text and the
/// flag is set so the receiver knows to parse it back.
pub(crate) fn value_to_text(value: &Value) -> Result<(Cow<'_, str>, bool), ProtocolError> {
    match value {
        Value::String(text) => Ok((Cow::Borrowed(text.as_str()), false)),
        other => serde_json::to_string(other)
            .map(|json| (Cow::Owned(json), true))
            .map_err(ProtocolError::encode),
    }
}

/// Inverse of [`value_to_text`].
pub(crate) fn value_from_text(text: String, is_json: bool) -> Result<Value, ProtocolError> {
    if is_json {
        serde_json::from_str(&text).map_err(ProtocolError::malformed)
    } else {
        Ok(Value::String(text))
    }
}

impl From<&Message> for Record {
    fn from(message: &Message) -> Self {
        let mut record = Record {
            command: message.command().to_string(),
            ..Record::default()
        };
        match message {
            Message::Subscribe { topic } | Message::Unsubscribe { topic } => {
                record.topic = Some(topic.clone());
            }
            Message::Publish { topic, message } => {
                record.topic = Some(topic.clone());
                record.message = Some(message.clone());
            }
            Message::ListTopics => {}
            Message::ListTopicsResult { topics } => record.topics = Some(topics.clone()),
        }
        record
    }
}

impl TryFrom<Record> for Message {
    type Error = ProtocolError;

    fn try_from(record: Record) -> Result<Self, Self::Error> {
        let Record {
            command,
            topic,
            message,
            topics,
        } = record;

        match command.as_str() {
            SUBSCRIBE => Ok(Message::Subscribe {
                topic: required_topic(SUBSCRIBE, topic)?,
            }),
            PUBLISH => {
                let topic = required_topic(PUBLISH, topic)?;
                let message = message.ok_or_else(|| {
                    ProtocolError::MalformedPayload("publish without a message".into())
                })?;
                Ok(Message::Publish { topic, message })
            }
            UNSUBSCRIBE => Ok(Message::Unsubscribe {
                topic: required_topic(UNSUBSCRIBE, topic)?,
            }),
            LIST_TOPICS => Ok(match topics {
                Some(topics) => Message::ListTopicsResult { topics },
                None => Message::ListTopics,
            }),
            _ => Err(ProtocolError::UnknownCommand(command)),
        }
    }
}

fn required_topic(command: &str, topic: Option<String>) -> Result<String, ProtocolError> {
    match topic {
        Some(topic) if !topic.is_empty() => Ok(topic),
        Some(_) => Err(ProtocolError::MalformedPayload(format!(
            "{command} with an empty topic"
        ))),
        None => Err(ProtocolError::MalformedPayload(format!(
            "{command} without a topic"
        ))),
    }
}
