//! The `transport` module carries frames between TCP clients and the broker.
//!
//! - `connection`: per-connection reader and writer tasks and the table of live connections
//! - `server`: the listener and the single event loop that owns all broker state

pub mod connection;
pub mod server;

pub use connection::{CloseReason, Connection, ConnectionEvent, ConnectionTable};
pub use server::Server;
