//! The `broker` module holds the pub/sub state and routing logic.
//!
//! - `engine`: the [`Broker`], which applies commands to the stores and fans out deliveries
//! - `topic`: retained values per topic
//! - `subscription`: who is subscribed to what, with which encoding
//! - `session`: connection identity and the per-connection encoding state machine

pub mod engine;
pub mod session;
pub mod subscription;
pub mod topic;

pub use engine::{Broker, Peers};
pub use session::{ConnectionId, Session, SessionState};
pub use subscription::{Subscriber, SubscriptionRegistry};
pub use topic::TopicStore;
