//! TCP front end of the broker.
//!
//! One task owns the listener, the [`Broker`] and the [`ConnectionTable`].
//! It wakes up on three things: shutdown, a new connection, or an event from
//! a connection task. Every wake-up is handled to completion before the next
//! one, so broker state is never shared or locked.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use chrono::Utc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

use crate::broker::{Broker, ConnectionId};
use crate::config::{BrokerSettings, Settings};
use crate::protocol::Frame;
use crate::transport::connection::{CloseReason, Connection, ConnectionEvent, ConnectionTable};
use crate::utils::error::ServerError;

/// A bound broker that has not started serving yet.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    limits: BrokerSettings,
}

impl Server {
    pub async fn bind(settings: &Settings) -> Result<Self, ServerError> {
        let addr = settings.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(addr = %listener.local_addr()?, "broker listening");
        Ok(Self {
            listener,
            limits: settings.broker.clone(),
        })
    }

    /// The address actually bound, useful when the configured port was 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves, then close every connection.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let Server { listener, limits } = self;
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut event_loop = EventLoop::new(limits, events_tx);
        tokio::pin!(shutdown);

        loop {
            let ready = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => Ready::Listener(accepted),
                Some(event) = events_rx.recv() => Ready::Client(event),
            };
            event_loop.on_ready(ready);
        }

        if event_loop.connections.is_empty() {
            info!("broker shutting down");
        } else {
            info!(connections = event_loop.connections.len(), "broker shutting down");
        }
        event_loop.close_all();
        Ok(())
    }

    /// Serve until the process receives Ctrl-C.
    pub async fn run_until_ctrl_c(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

/// One wake-up of the event loop, tagged by where it came from.
#[derive(Debug)]
enum Ready {
    Listener(io::Result<(TcpStream, SocketAddr)>),
    Client(ConnectionEvent),
}

struct EventLoop {
    broker: Broker,
    connections: ConnectionTable,
    events: UnboundedSender<ConnectionEvent>,
    limits: BrokerSettings,
}

impl EventLoop {
    fn new(limits: BrokerSettings, events: UnboundedSender<ConnectionEvent>) -> Self {
        Self {
            broker: Broker::new(),
            connections: ConnectionTable::new(),
            events,
            limits,
        }
    }

    fn on_ready(&mut self, ready: Ready) {
        match ready {
            Ready::Listener(Ok((stream, peer))) => self.accept(stream, peer),
            Ready::Listener(Err(err)) => warn!(error = %err, "accept failed"),
            Ready::Client(ConnectionEvent::Frame { id, frame }) => self.on_frame(id, frame),
            Ready::Client(ConnectionEvent::Closed { id, reason }) => self.teardown(id, reason),
        }
    }

    fn accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        if self.connections.len() >= self.limits.max_connections {
            warn!(%peer, reason = %CloseReason::Rejected, limit = self.limits.max_connections, "refusing connection");
            return;
        }

        let id = ConnectionId::new();
        let connection = Connection::spawn(id, stream, peer, self.events.clone(), &self.limits);
        self.connections.insert(connection);
        info!(connection = %id, %peer, total = self.connections.len(), "connection accepted");
    }

    fn on_frame(&mut self, id: ConnectionId, frame: Frame) {
        match self.broker.on_frame(id, &frame, &mut self.connections) {
            Ok(unreachable) => {
                for peer in unreachable {
                    self.teardown(peer, CloseReason::Unreachable);
                }
            }
            Err(err) => self.teardown(id, CloseReason::Protocol(err)),
        }
    }

    /// Forget a connection: drop its subscriptions and its tasks.
    ///
    /// Safe to call more than once for the same id; only the first call does
    /// anything.
    fn teardown(&mut self, id: ConnectionId, reason: CloseReason) {
        let Some(connection) = self.connections.remove(id) else {
            debug!(connection = %id, %reason, "already closed");
            return;
        };

        if matches!(reason, CloseReason::Unreachable) {
            connection.abort_writer();
        }
        let purged = self.broker.disconnect(id);
        let lifetime = Utc::now() - connection.connected_at();
        let peer = connection.peer();
        if reason.is_clean() {
            info!(connection = %id, %peer, %reason, purged, lifetime_ms = lifetime.num_milliseconds(), "connection closed");
        } else {
            warn!(connection = %id, %peer, %reason, purged, lifetime_ms = lifetime.num_milliseconds(), "connection closed");
        }
    }

    fn close_all(&mut self) {
        for id in self.connections.ids() {
            self.teardown(id, CloseReason::Shutdown);
        }
    }
}
