//! The `error` module defines the error types shared across `topicbus`.
//!
//! Wire-level failures live in [`crate::protocol::ProtocolError`]; this module
//! covers delivery to connections, server startup and the client queue.

use std::io;

use thiserror::Error;

use crate::broker::ConnectionId;

/// A frame could not be handed to a connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("{0} is not registered")]
    UnknownConnection(ConnectionId),

    #[error("{0} is no longer accepting frames")]
    Closed(ConnectionId),

    #[error("{0} has too many frames waiting to be written")]
    Backlogged(ConnectionId),
}

/// Failures that stop the server from starting or keep it from running.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures seen by the client-side [`crate::client::Queue`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Protocol(#[from] crate::protocol::ProtocolError),

    #[error("broker closed the connection")]
    Closed,
}
