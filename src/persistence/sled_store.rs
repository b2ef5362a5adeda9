use std::collections::HashMap;

use sled::Db;
use tracing::warn;

use crate::broker::message::HistoryRecord;
use crate::utils::error::PersistenceError;

const TREE_PREFIX: &str = "history/";

/// Sled-backed history store.
///
/// Each topic gets its own tree, `history/<topic>`. Keys are big-endian ids
/// from `Db::generate_id`, which only grow, so iterating a tree returns the
/// records in append order, across restarts too.
#[derive(Clone)]
pub struct Persistence {
    db: Db,
}

impl Persistence {
    pub fn open(path: &str) -> Result<Self, PersistenceError> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// A store that is deleted when the last handle is dropped.
    pub fn temporary() -> Result<Self, PersistenceError> {
        Ok(Self {
            db: sled::Config::new().temporary(true).open()?,
        })
    }

    pub fn append(&self, topic: &str, record: &HistoryRecord) -> Result<(), PersistenceError> {
        let serialized = serde_json::to_vec(record)?;
        let key = self.db.generate_id()?;
        self.db
            .open_tree(tree_name(topic))?
            .insert(key.to_be_bytes(), serialized)?;
        Ok(())
    }

    pub fn load(&self, topic: &str) -> Result<Vec<HistoryRecord>, PersistenceError> {
        let tree = self.db.open_tree(tree_name(topic))?;
        let mut records = Vec::with_capacity(tree.len());
        for entry in tree.iter() {
            let (key, value) = entry?;
            match serde_json::from_slice(&value) {
                Ok(record) => records.push(record),
                Err(e) => warn!(topic, key = ?key, "Skipping unreadable history record: {e}"),
            }
        }
        Ok(records)
    }

    /// Every stored topic with its records.
    pub fn load_all(&self) -> Result<HashMap<String, Vec<HistoryRecord>>, PersistenceError> {
        let mut topics = HashMap::new();
        for name in self.db.tree_names() {
            let Some(topic) = name.strip_prefix(TREE_PREFIX.as_bytes()) else {
                continue;
            };
            let topic = String::from_utf8_lossy(topic).into_owned();
            let records = self.load(&topic)?;
            if !records.is_empty() {
                topics.insert(topic, records);
            }
        }
        Ok(topics)
    }

    pub fn flush(&self) -> Result<(), PersistenceError> {
        self.db.flush()?;
        Ok(())
    }
}

fn tree_name(topic: &str) -> String {
    format!("{TREE_PREFIX}{topic}")
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("db", &"sled::Db")
            .finish()
    }
}
