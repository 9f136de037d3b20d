//! Wire protocol
//!
//! Every unit on the wire is a frame: a one-byte encoding tag, a big-endian
//! `u16` payload length and the payload itself. The payload carries exactly
//! one [`Message`], serialized with the encoding named by the tag.
//!
//! ```text
//! byte 0       : encoding tag (0 = json, 1 = xml, 2 = binary)
//! bytes 1-2    : payload length L, big-endian
//! bytes 3..3+L : payload
//! ```
//!
//! - `frame`: the incremental [`FrameDecoder`] and [`encode_frame`]
//! - `codec`: the closed [`Encoding`] set and per-encoding encode/decode
//! - `message`: the protocol commands

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
mod xml;

pub use codec::{Encoding, decode, encode};
pub use error::ProtocolError;
pub use frame::{Frame, FrameDecoder, MAX_PAYLOAD_LEN, ReadState, encode_frame};
pub use message::Message;

use bytes::Bytes;

/// Encodes `message` with `encoding` and wraps it in a frame ready for the wire.
pub fn frame_message(encoding: Encoding, message: &Message) -> Result<Bytes, ProtocolError> {
    let payload = encoding.encode(message)?;
    encode_frame(encoding.tag(), &payload)
}

#[cfg(test)]
mod tests;
