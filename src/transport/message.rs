//! Wire protocol: JSON objects tagged by a `type` field.

use serde::{Deserialize, Serialize};

use crate::broker::message::{HistoryRecord, Message};
use crate::utils::error::BrokerError;

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first message on a connection.
    Attach { name: String },
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    CreateTopic {
        name: String,
        #[serde(default)]
        limit: usize,
        #[serde(default)]
        admin: Option<String>,
    },
    Join {
        topic: String,
        admin: String,
        #[serde(default)]
        promote: bool,
    },
    Leave { topic: String, admin: String },
    Broadcast { topic: String, payload: String },
    Send { receiver: String, payload: String },
    History { topic: String },
    MemberCount { topic: String },
    Detach,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Attached { name: String },
    Detached,
    Ok { message: String },
    Error { code: String, message: String },
    Delivery { message: Message },
    History {
        topic: String,
        records: Vec<HistoryRecord>,
    },
    MemberCount { topic: String, count: usize },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<BrokerError> for ServerMessage {
    fn from(err: BrokerError) -> Self {
        ServerMessage::error(err.as_label(), err.to_string())
    }
}
