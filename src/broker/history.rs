//! Per-topic history of broadcasts.
//!
//! Records are only ever appended. Callers hold the registry lock, so reads
//! always see a prefix of the final log.

use std::collections::HashMap;

use crate::broker::message::HistoryRecord;

#[derive(Debug, Default)]
pub struct HistoryLog {
    topics: HashMap<String, Vec<HistoryRecord>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the log with records recovered from persistence.
    pub fn restore(topics: HashMap<String, Vec<HistoryRecord>>) -> Self {
        Self { topics }
    }

    pub fn append(&mut self, topic: &str, record: HistoryRecord) {
        self.topics.entry(topic.to_string()).or_default().push(record);
    }

    /// Copy of the topic's records, oldest first. Empty for unknown topics.
    pub fn get(&self, topic: &str) -> Vec<HistoryRecord> {
        self.topics.get(topic).cloned().unwrap_or_default()
    }
}
