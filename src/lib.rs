//! # Huddle
//!
//! `huddle` is an in-process publish/subscribe broker. Named subscribers join
//! topics, either openly or through admin-gated groups with a member limit,
//! and receive messages broadcast to those topics or sent to them directly.
//! Every broadcast is kept in a per-topic history.
//!
//! ## Core Modules
//!
//! - `broker`: the topic registry, membership protocol, delivery and history.
//! - `subscriber`: the subscriber handle and the inbox its consumer drains.
//! - `config`: loading settings from a file and the environment.
//! - `persistence`: optional sled-backed mirror of topic history.
//! - `transport`: a WebSocket server mapping JSON commands onto the broker.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod config;
pub mod persistence;
pub mod subscriber;
pub mod transport;
pub mod utils;

pub use broker::{Broker, HistoryRecord, Message, MessageKind};
pub use subscriber::{Inbox, Subscriber};
pub use utils::error::{BrokerError, PersistenceError};
