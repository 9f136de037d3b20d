//! The `client` module is the producer/consumer side of the broker.
//!
//! It provides the [`Queue`], a thin async wrapper that owns one TCP connection,
//! talks to the broker in a single encoding and is bound to one topic.

pub mod queue;
pub use queue::{Queue, QueueKind};
