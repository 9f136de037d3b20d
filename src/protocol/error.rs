//! Protocol-level error types.

use thiserror::Error;

use crate::protocol::Encoding;

/// Everything that can go wrong while framing, encoding or decoding a message.
///
/// All variants except `Encode` are protocol violations when they originate
/// from a peer: the offending connection is closed and its subscriptions purged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame payload of {actual} bytes exceeds the {max} byte limit")]
    FrameTooLarge { actual: usize, max: usize },

    #[error("unsupported encoding tag {0}")]
    UnsupportedEncoding(u8),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("frame encoded as {actual} on a connection using {negotiated}")]
    EncodingMismatch {
        negotiated: Encoding,
        actual: Encoding,
    },

    #[error("clients may not send {0}")]
    UnexpectedCommand(&'static str),

    #[error("failed to encode payload: {0}")]
    Encode(String),
}

impl ProtocolError {
    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        Self::MalformedPayload(err.to_string())
    }

    pub(crate) fn encode(err: impl std::fmt::Display) -> Self {
        Self::Encode(err.to_string())
    }
}
