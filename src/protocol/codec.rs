//! Payload encodings
//!
//! The set of encodings is closed: a frame's tag byte indexes into
//! [`REGISTERED`] and each variant owns one encode/decode pair. All three
//! carry the same [`Record`](crate::protocol::message::Record) so a message
//! survives a trip through any of them unchanged, including structured
//! published values.

use std::fmt;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::protocol::message::{Record, value_from_text, value_to_text};
use crate::protocol::{MAX_PAYLOAD_LEN, Message, ProtocolError, xml};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Structured text (JSON), tag 0.
    Json,
    /// Markup (XML), tag 1.
    Xml,
    /// Compact binary (bincode), tag 2.
    Binary,
}

/// Lookup table from tag byte to encoding.
pub const REGISTERED: [Encoding; 3] = [Encoding::Json, Encoding::Xml, Encoding::Binary];

impl Encoding {
    pub const fn tag(self) -> u8 {
        match self {
            Encoding::Json => 0,
            Encoding::Xml => 1,
            Encoding::Binary => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, ProtocolError> {
        REGISTERED
            .get(usize::from(tag))
            .copied()
            .ok_or(ProtocolError::UnsupportedEncoding(tag))
    }

    pub fn encode(self, message: &Message) -> Result<Vec<u8>, ProtocolError> {
        let record = Record::from(message);
        match self {
            Encoding::Json => json_encode(&record),
            Encoding::Xml => xml::encode(&record),
            Encoding::Binary => binary_encode(&record),
        }
    }

    /// Parse `payload` and validate it as a command.
    ///
    /// Bytes that do not parse fail with `MalformedPayload`; a parsed record
    /// naming an unrecognized command fails with `UnknownCommand`.
    pub fn decode(self, payload: &[u8]) -> Result<Message, ProtocolError> {
        let record = match self {
            Encoding::Json => json_decode(payload)?,
            Encoding::Xml => xml::decode(payload)?,
            Encoding::Binary => binary_decode(payload)?,
        };
        Message::try_from(record)
    }
}

impl TryFrom<u8> for Encoding {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Self::from_tag(tag)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Json => "json",
            Encoding::Xml => "xml",
            Encoding::Binary => "binary",
        };
        f.write_str(name)
    }
}

pub fn encode(encoding: Encoding, message: &Message) -> Result<Vec<u8>, ProtocolError> {
    encoding.encode(message)
}

pub fn decode(encoding: Encoding, payload: &[u8]) -> Result<Message, ProtocolError> {
    encoding.decode(payload)
}

fn json_encode(record: &Record) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(record).map_err(ProtocolError::encode)
}

fn json_decode(payload: &[u8]) -> Result<Record, ProtocolError> {
    serde_json::from_slice(payload).map_err(ProtocolError::malformed)
}

/// Positional record for the binary encoding. Field order is the wire order.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BinaryRecord {
    pub command: String,
    pub topic: Option<String>,
    pub message: Option<BinaryValue>,
    pub topics: Option<Vec<String>>,
}

/// A published value in the binary encoding.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum BinaryValue {
    Text(String),
    /// Any non-string value, as JSON text.
    Json(String),
}

impl BinaryRecord {
    fn from_record(record: &Record) -> Result<Self, ProtocolError> {
        let message = match &record.message {
            Some(value) => {
                let (text, is_json) = value_to_text(value)?;
                let text = text.into_owned();
                Some(if is_json {
                    BinaryValue::Json(text)
                } else {
                    BinaryValue::Text(text)
                })
            }
            None => None,
        };
        Ok(Self {
            command: record.command.clone(),
            topic: record.topic.clone(),
            message,
            topics: record.topics.clone(),
        })
    }

    fn into_record(self) -> Result<Record, ProtocolError> {
        let message = match self.message {
            Some(BinaryValue::Text(text)) => Some(value_from_text(text, false)?),
            Some(BinaryValue::Json(text)) => Some(value_from_text(text, true)?),
            None => None,
        };
        Ok(Record {
            command: self.command,
            topic: self.topic,
            message,
            topics: self.topics,
        })
    }
}

pub(crate) fn binary_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_PAYLOAD_LEN as u64)
}

fn binary_encode(record: &Record) -> Result<Vec<u8>, ProtocolError> {
    binary_options()
        .serialize(&BinaryRecord::from_record(record)?)
        .map_err(ProtocolError::encode)
}

fn binary_decode(payload: &[u8]) -> Result<Record, ProtocolError> {
    binary_options()
        .deserialize::<BinaryRecord>(payload)
        .map_err(ProtocolError::malformed)?
        .into_record()
}
