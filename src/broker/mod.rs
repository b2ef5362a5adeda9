//! The broker: topic registry, membership protocol, delivery and history.

pub mod engine;
pub mod history;
pub mod message;
pub mod registry;
pub mod topic;

pub use engine::Broker;
pub use message::{HistoryRecord, Message, MessageKind};
