//! Error types returned by the broker and its persistence layer.
//!
//! - [`BrokerError`] covers every rejected membership or delivery request.
//!   A rejected operation never leaves a partial mutation behind.
//! - [`PersistenceError`] covers the optional on-disk history mirror.
//!
//! Both expose `as_label` for logs and for the error codes sent over the wire.

use thiserror::Error;

/// Errors produced by broker operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The sender lacks the membership required for a delivery.
    #[error("{sender} is not subscribed to {topic}")]
    NotSubscribed { sender: String, topic: String },

    /// The named admin is empty or not an admin of the group.
    #[error("{admin:?} is not an admin of {topic}")]
    NotAuthorized { admin: String, topic: String },

    /// The group is at capacity.
    #[error("{topic} has reached its limit of {limit} members")]
    LimitExceeded { topic: String, limit: usize },

    /// A leave was requested for a subscriber that is not in the group.
    #[error("{subscriber} is not a member of {topic}")]
    NotAMember { subscriber: String, topic: String },

    /// The subscriber handle was destroyed by a detach, a re-attach or shutdown.
    #[error("subscriber {subscriber} has been detached")]
    Detached { subscriber: String },
}

impl BrokerError {
    /// Returns a short stable label (snake_case) for logs and wire error codes.
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::NotSubscribed { .. } => "not_subscribed",
            BrokerError::NotAuthorized { .. } => "not_authorized",
            BrokerError::LimitExceeded { .. } => "limit_exceeded",
            BrokerError::NotAMember { .. } => "not_a_member",
            BrokerError::Detached { .. } => "detached",
        }
    }
}

/// Errors produced by the sled-backed history store.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("history store failure: {0}")]
    Store(#[from] sled::Error),

    #[error("history record codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}

impl PersistenceError {
    pub fn as_label(&self) -> &'static str {
        match self {
            PersistenceError::Store(_) => "persistence_store",
            PersistenceError::Codec(_) => "persistence_codec",
        }
    }
}
