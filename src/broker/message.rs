//! Message definitions for the broker
//!
//! `Message` is what a consumer pulls out of its inbox. One is built per
//! broadcast or send and cloned per recipient.
//!
//! Notes on fields:
//! - `id`: uuid v4, shared by every copy of one broadcast
//! - `topic`: topic name; for direct messages, the receiver's name
//! - `timestamp`: milliseconds since UNIX epoch, set by the broker
//!
//! `HistoryRecord` is the append-only trace a broadcast leaves on its topic.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Broadcast,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub topic: String,
    pub sender: String,
    pub payload: String,
    pub timestamp: i64,
    pub kind: MessageKind,
}

impl Message {
    pub fn broadcast(topic: &str, sender: &str, payload: &str) -> Self {
        Self::build(topic, sender, payload, MessageKind::Broadcast)
    }

    pub fn direct(receiver: &str, sender: &str, payload: &str) -> Self {
        Self::build(receiver, sender, payload, MessageKind::Direct)
    }

    fn build(topic: &str, sender: &str, payload: &str, kind: MessageKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            sender: sender.to_string(),
            payload: payload.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: i64,
    pub sender: String,
    pub payload: String,
}

impl From<&Message> for HistoryRecord {
    fn from(msg: &Message) -> Self {
        Self {
            timestamp: msg.timestamp,
            sender: msg.sender.clone(),
            payload: msg.payload.clone(),
        }
    }
}
