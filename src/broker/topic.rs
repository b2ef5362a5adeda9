//! Topic management
//!
//! A `Topic` holds the member handles for a topic name, an optional member
//! limit and the admins allowed to gate group joins and leaves.
//!
//! Plain topics have no limit and no admins, so every admin check on them
//! fails. Group topics are created with an admin, who is also the first member.
//!
//! Concurrency note: callers must hold the broker's registry lock when
//! modifying a topic.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::subscriber::{Subscriber, SubscriberId};

#[derive(Debug)]
pub struct Topic {
    pub name: String,
    members: HashMap<SubscriberId, Arc<Subscriber>>,
    limit: Option<NonZeroUsize>,
    admins: Admins,
}

impl Topic {
    /// Create an open topic: no limit, no admins.
    pub fn new(name: &str) -> Self {
        Self::with_limit(name, 0)
    }

    /// Create a topic capped at `limit` members; `0` means unlimited.
    pub fn with_limit(name: &str, limit: usize) -> Self {
        Self {
            name: name.to_string(),
            members: HashMap::new(),
            limit: NonZeroUsize::new(limit),
            admins: Admins::default(),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit.map(NonZeroUsize::get)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn is_full(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.members.len() >= limit.get())
    }

    /// Insert or rebind a member. Duplicate adds replace the stored handle.
    pub fn admit(&mut self, subscriber: Arc<Subscriber>) {
        self.members
            .insert(subscriber.name().to_string(), subscriber);
    }

    /// Remove the member called `name` only if it is bound to `subscriber`.
    pub fn remove(&mut self, subscriber: &Arc<Subscriber>) -> bool {
        let bound = self
            .members
            .get(subscriber.name())
            .is_some_and(|current| Arc::ptr_eq(current, subscriber));
        if bound {
            self.members.remove(subscriber.name());
        }
        bound
    }

    /// Handles of all current members.
    pub fn members(&self) -> Vec<Arc<Subscriber>> {
        self.members.values().cloned().collect()
    }

    pub fn is_admin(&self, name: &str) -> bool {
        self.admins.contains(name)
    }

    pub fn grant_admin(&mut self, name: &str) {
        self.admins.grant(name);
    }

    /// Admin names in the order they were granted; the creator comes first.
    pub fn admins(&self) -> &[String] {
        self.admins.ordered()
    }
}

/// Insertion-ordered admin list with constant-time lookups.
#[derive(Debug, Default)]
pub struct Admins {
    order: Vec<String>,
    lookup: HashSet<String>,
}

impl Admins {
    pub fn grant(&mut self, name: &str) {
        if self.lookup.insert(name.to_string()) {
            self.order.push(name.to_string());
        }
    }

    /// Empty names never match.
    pub fn contains(&self, name: &str) -> bool {
        !name.is_empty() && self.lookup.contains(name)
    }

    pub fn ordered(&self) -> &[String] {
        &self.order
    }
}
