//! Length-prefixed framing.
//!
//! Reads on a non-blocking stream can stop anywhere inside a frame, so the
//! decoder is a small state machine that is fed whatever bytes arrived and
//! resumes where it left off on the next read.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::protocol::ProtocolError;

/// Size of the tag + length header in bytes.
pub const HEADER_LEN: usize = 3;

/// Largest payload the two-byte length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// One decoded frame: the raw encoding tag and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: u8,
    pub payload: Bytes,
}

/// Where the decoder is inside the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    AwaitingTag,
    AwaitingLength { tag: u8 },
    AwaitingPayload { tag: u8, len: usize },
    /// A frame was just handed out; the next call starts a new one.
    Complete,
}

/// Incremental frame decoder, one per connection.
#[derive(Debug)]
pub struct FrameDecoder {
    state: ReadState,
    max_payload_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_LEN)
    }
}

impl FrameDecoder {
    /// Create a decoder that rejects frames announcing more than `max_payload_len` bytes.
    pub fn new(max_payload_len: usize) -> Self {
        Self {
            state: ReadState::AwaitingTag,
            max_payload_len: max_payload_len.min(MAX_PAYLOAD_LEN),
        }
    }

    pub fn state(&self) -> ReadState {
        self.state
    }

    /// True while part of a frame has been consumed but not yet returned.
    pub fn is_mid_frame(&self) -> bool {
        matches!(
            self.state,
            ReadState::AwaitingLength { .. } | ReadState::AwaitingPayload { .. }
        )
    }

    /// Consume bytes from `src` and return the next complete frame, if any.
    ///
    /// Returns `Ok(None)` when `src` runs dry; whatever was consumed so far is
    /// remembered and the call can be repeated once more bytes are appended.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        loop {
            match self.state {
                ReadState::Complete => self.state = ReadState::AwaitingTag,
                ReadState::AwaitingTag => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let tag = src.get_u8();
                    self.state = ReadState::AwaitingLength { tag };
                }
                ReadState::AwaitingLength { tag } => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    let len = usize::from(src.get_u16());
                    if len > self.max_payload_len {
                        return Err(ProtocolError::FrameTooLarge {
                            actual: len,
                            max: self.max_payload_len,
                        });
                    }
                    self.state = ReadState::AwaitingPayload { tag, len };
                }
                ReadState::AwaitingPayload { tag, len } => {
                    if src.len() < len {
                        src.reserve(len - src.len());
                        return Ok(None);
                    }
                    let payload = src.split_to(len).freeze();
                    self.state = ReadState::Complete;
                    return Ok(Some(Frame { tag, payload }));
                }
            }
        }
    }
}

/// Build `tag || len (u16, big-endian) || payload`.
pub fn encode_frame(tag: u8, payload: &[u8]) -> Result<Bytes, ProtocolError> {
    let len = u16::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge {
        actual: payload.len(),
        max: MAX_PAYLOAD_LEN,
    })?;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(tag);
    buf.put_u16(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}
