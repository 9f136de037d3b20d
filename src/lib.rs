//! # TopicBus
//!
//! `topicbus` is an in-memory publish/subscribe broker speaking a small framed
//! TCP protocol. Every topic retains its last published value, subscriptions
//! match by topic prefix, and each client picks its own payload encoding
//! (JSON, XML or a compact binary form) with the first frame it sends.
//!
//! ## Core Modules
//!
//! - `protocol`: framing, the command set and the three payload encodings.
//! - `broker`: topic store, subscription registry and the routing engine.
//! - `transport`: the TCP listener, per-connection tasks and the event loop.
//! - `client`: the `Queue` producer/consumer wrapper.
//! - `config`: layered configuration loading.
//! - `utils`: shared error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod protocol;
pub mod transport;
pub mod utils;
