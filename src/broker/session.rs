//! Per-connection protocol state
//!
//! A connection starts `Unidentified`. Its first frame fixes the encoding and
//! moves it to `Active` for the rest of its lifetime; every later frame must
//! carry the same tag.

use std::fmt;

use uuid::Uuid;

use crate::protocol::{Encoding, ProtocolError};

/// Stable identity of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unidentified,
    Active(Encoding),
}

#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    state: SessionState,
}

impl Session {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            state: SessionState::Unidentified,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Negotiated encoding, once the first frame has arrived.
    pub fn encoding(&self) -> Option<Encoding> {
        match self.state {
            SessionState::Unidentified => None,
            SessionState::Active(encoding) => Some(encoding),
        }
    }

    /// Check a frame's tag against this session, fixing the encoding on the first frame.
    pub fn identify(&mut self, tag: u8) -> Result<Encoding, ProtocolError> {
        let actual = Encoding::from_tag(tag)?;
        match self.state {
            SessionState::Unidentified => {
                self.state = SessionState::Active(actual);
                Ok(actual)
            }
            SessionState::Active(negotiated) if negotiated == actual => Ok(actual),
            SessionState::Active(negotiated) => {
                Err(ProtocolError::EncodingMismatch { negotiated, actual })
            }
        }
    }
}
