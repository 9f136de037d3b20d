//! Accepted client connections.
//!
//! Each connection is split into a reader task and a writer task. The reader
//! turns bytes into frames and forwards them to the event loop; the writer
//! drains the connection's outbound queue onto the socket. Neither task ever
//! touches broker state.
//!
//! The outbound queue is bounded. A peer that stops reading fills it, and the
//! next delivery fails with [`DeliveryError::Backlogged`] instead of growing
//! the broker's memory.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::broker::{ConnectionId, Peers, Session};
use crate::config::BrokerSettings;
use crate::protocol::{Frame, FrameDecoder, ProtocolError};
use crate::utils::error::DeliveryError;

const READ_BUFFER_CAPACITY: usize = 4 * 1024;

/// Why a connection is being torn down.
#[derive(Debug)]
pub enum CloseReason {
    /// The peer closed its side of the stream.
    EndOfStream,
    Protocol(ProtocolError),
    Io(io::Error),
    /// A delivery to this connection failed.
    Unreachable,
    /// Refused at accept time because the connection limit was reached.
    Rejected,
    Shutdown,
}

impl CloseReason {
    /// True for closes that are part of normal operation.
    pub fn is_clean(&self) -> bool {
        matches!(self, CloseReason::EndOfStream | CloseReason::Shutdown)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::EndOfStream => f.write_str("end of stream"),
            CloseReason::Protocol(err) => write!(f, "protocol violation: {err}"),
            CloseReason::Io(err) => write!(f, "i/o error: {err}"),
            CloseReason::Unreachable => f.write_str("unreachable"),
            CloseReason::Rejected => f.write_str("connection limit reached"),
            CloseReason::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// What connection tasks report back to the event loop.
#[derive(Debug)]
pub enum ConnectionEvent {
    Frame { id: ConnectionId, frame: Frame },
    Closed { id: ConnectionId, reason: CloseReason },
}

/// The event loop's handle on one live connection.
///
/// Dropping it aborts the reader task and closes the outbound queue, which
/// lets the writer flush what is already queued and then close the socket.
#[derive(Debug)]
pub struct Connection {
    pub session: Session,
    peer: SocketAddr,
    outbound: Sender<Bytes>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    connected_at: DateTime<Utc>,
}

impl Connection {
    /// Start the reader and writer tasks for a freshly accepted stream.
    pub fn spawn(
        id: ConnectionId,
        stream: TcpStream,
        peer: SocketAddr,
        events: UnboundedSender<ConnectionEvent>,
        limits: &BrokerSettings,
    ) -> Self {
        if let Err(err) = stream.set_nodelay(true) {
            debug!(connection = %id, error = %err, "failed to set TCP_NODELAY");
        }
        let (read_half, write_half) = stream.into_split();
        let (outbound, queued) = mpsc::channel(limits.max_queued_frames.max(1));

        let reader = tokio::spawn(read_loop(
            id,
            read_half,
            events.clone(),
            FrameDecoder::new(limits.max_payload_len),
        ));
        let writer = tokio::spawn(write_loop(id, write_half, queued, events));

        Self {
            session: Session::new(id),
            peer,
            outbound,
            reader,
            writer,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.session.id()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue a frame for the writer task. Never blocks.
    pub fn send(&self, frame: Bytes) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Backlogged(self.id()),
            TrySendError::Closed(_) => DeliveryError::Closed(self.id()),
        })
    }

    /// Stop the writer without flushing. A writer stuck on a peer that does
    /// not read would otherwise keep the socket open forever.
    pub fn abort_writer(&self) {
        self.writer.abort();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    id: ConnectionId,
    mut stream: OwnedReadHalf,
    events: UnboundedSender<ConnectionEvent>,
    mut decoder: FrameDecoder,
) {
    let mut buf = BytesMut::with_capacity(READ_BUFFER_CAPACITY);

    let reason = loop {
        match decoder.decode(&mut buf) {
            Ok(Some(frame)) => {
                if events.send(ConnectionEvent::Frame { id, frame }).is_err() {
                    return;
                }
                continue;
            }
            Ok(None) => {}
            Err(err) => break CloseReason::Protocol(err),
        }

        match stream.read_buf(&mut buf).await {
            Ok(0) => {
                if decoder.is_mid_frame() || !buf.is_empty() {
                    debug!(connection = %id, "stream ended inside a frame, discarding it");
                }
                break CloseReason::EndOfStream;
            }
            Ok(_) => {}
            Err(err) => break CloseReason::Io(err),
        }
    };

    let _ = events.send(ConnectionEvent::Closed { id, reason });
}

async fn write_loop(
    id: ConnectionId,
    mut stream: OwnedWriteHalf,
    mut queued: Receiver<Bytes>,
    events: UnboundedSender<ConnectionEvent>,
) {
    while let Some(frame) = queued.recv().await {
        if let Err(err) = stream.write_all(&frame).await {
            let _ = events.send(ConnectionEvent::Closed {
                id,
                reason: CloseReason::Io(err),
            });
            return;
        }
    }
    let _ = stream.shutdown().await;
}

/// Every live connection, keyed by identity.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connection: Connection) {
        self.connections.insert(connection.id(), connection);
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Peers for ConnectionTable {
    fn session_mut(&mut self, id: ConnectionId) -> Option<&mut Session> {
        self.connections.get_mut(&id).map(|c| &mut c.session)
    }

    fn deliver(&mut self, to: ConnectionId, frame: Bytes) -> Result<(), DeliveryError> {
        match self.connections.get(&to) {
            Some(connection) => connection.send(frame),
            None => Err(DeliveryError::UnknownConnection(to)),
        }
    }
}
