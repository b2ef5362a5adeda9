//! Topic registry
//!
//! The registry is the broker's whole mutable state: the subscriber table, the
//! topics with their members, limits and admins, and the history log. It has
//! no locking of its own; `Broker` wraps it in a single `RwLock` so that every
//! method here runs as one critical section.
//!
//! Membership is one edge set kept in two indexes: the topic's member map and
//! the subscriber's topic set. Only [`link`] and [`unlink`] touch either side.

use std::collections::HashMap;
use std::sync::Arc;

use crate::broker::history::HistoryLog;
use crate::broker::message::{HistoryRecord, Message};
use crate::broker::topic::Topic;
use crate::subscriber::{Subscriber, SubscriberId};
use crate::utils::error::BrokerError;

#[derive(Debug)]
pub struct Registry {
    subscribers: HashMap<SubscriberId, Arc<Subscriber>>,
    topics: HashMap<String, Topic>,
    history: HistoryLog,
    inbox_capacity: usize,
}

impl Registry {
    pub fn new(inbox_capacity: usize, history: HistoryLog) -> Self {
        Self {
            subscribers: HashMap::new(),
            topics: HashMap::new(),
            history,
            inbox_capacity: inbox_capacity.max(1),
        }
    }

    /// Store `subscriber` under its name. A previous handle with the same name
    /// hands its memberships over and is returned so the caller can destroy it.
    pub fn attach(&mut self, subscriber: Arc<Subscriber>) -> Option<Arc<Subscriber>> {
        let previous = self
            .subscribers
            .insert(subscriber.name().to_string(), Arc::clone(&subscriber))?;

        for name in previous.topics() {
            match self.topics.get_mut(&name) {
                Some(topic) => {
                    if unlink(topic, &previous) {
                        link(topic, &subscriber);
                    }
                }
                None => previous.remove_topic(&name),
            }
        }
        Some(previous)
    }

    /// The live handle called `name`, attaching a fresh one if there is none.
    pub fn attach_if_absent(&mut self, name: &str) -> Arc<Subscriber> {
        if let Some(current) = self.subscribers.get(name) {
            if !current.is_closed() {
                return Arc::clone(current);
            }
        }
        let subscriber = Arc::new(Subscriber::new(name, self.inbox_capacity));
        self.subscribers
            .insert(name.to_string(), Arc::clone(&subscriber));
        subscriber
    }

    pub fn subscriber(&self, name: &str) -> Option<Arc<Subscriber>> {
        self.subscribers.get(name).cloned()
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.topics.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns `false` when the topic already existed and nothing changed.
    pub fn create_topic(&mut self, name: &str, limit: usize, admin: Option<&str>) -> bool {
        if self.topics.contains_key(name) {
            return false;
        }

        let mut topic = Topic::with_limit(name, limit);
        if let Some(admin) = admin.filter(|admin| !admin.is_empty()) {
            let handle = self.attach_if_absent(admin);
            topic.grant_admin(admin);
            link(&mut topic, &handle);
        }
        self.topics.insert(name.to_string(), topic);
        true
    }

    /// Open membership: creates the topic when missing, never checks limits.
    pub fn subscribe(&mut self, subscriber: &Arc<Subscriber>, topic: &str) -> Result<(), BrokerError> {
        ensure_live(subscriber)?;
        let topic = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic));
        link(topic, subscriber);
        Ok(())
    }

    /// Returns `false` when there was nothing to remove.
    pub fn unsubscribe(&mut self, subscriber: &Arc<Subscriber>, topic: &str) -> bool {
        match self.topics.get_mut(topic) {
            Some(topic) => unlink(topic, subscriber),
            None => false,
        }
    }

    /// Admin-gated membership. Authorization is checked before capacity, and
    /// a subscriber that is already a member never counts against the limit.
    pub fn join_group(
        &mut self,
        subscriber: &Arc<Subscriber>,
        topic: &str,
        admin: &str,
        promote: bool,
    ) -> Result<(), BrokerError> {
        ensure_live(subscriber)?;
        let group = self.authorize(topic, admin)?;

        if !group.is_member(subscriber.name()) {
            if group.is_full() {
                return Err(BrokerError::LimitExceeded {
                    topic: topic.to_string(),
                    limit: group.limit().unwrap_or_default(),
                });
            }
            link(group, subscriber);
        }
        if promote {
            group.grant_admin(subscriber.name());
        }
        Ok(())
    }

    /// Admin-gated removal. Admin rights of the leaving subscriber stay.
    pub fn leave_group(
        &mut self,
        subscriber: &Arc<Subscriber>,
        topic: &str,
        admin: &str,
    ) -> Result<(), BrokerError> {
        let group = self.authorize(topic, admin)?;

        if !unlink(group, subscriber) {
            return Err(BrokerError::NotAMember {
                subscriber: subscriber.name().to_string(),
                topic: topic.to_string(),
            });
        }
        Ok(())
    }

    /// Drops the handle from the subscriber table and from every topic it is
    /// in. Returns the topics it left.
    pub fn detach(&mut self, subscriber: &Arc<Subscriber>) -> Vec<String> {
        let registered = self
            .subscribers
            .get(subscriber.name())
            .is_some_and(|current| Arc::ptr_eq(current, subscriber));
        if registered {
            self.subscribers.remove(subscriber.name());
        }

        let topics = subscriber.topics();
        for name in &topics {
            match self.topics.get_mut(name) {
                Some(topic) => {
                    unlink(topic, subscriber);
                }
                None => subscriber.remove_topic(name),
            }
        }
        topics
    }

    /// Removes every subscriber from the table and returns them.
    pub fn drain_subscribers(&mut self) -> Vec<Arc<Subscriber>> {
        let drained: Vec<_> = self.subscribers.drain().map(|(_, s)| s).collect();
        for subscriber in &drained {
            for name in subscriber.topics() {
                match self.topics.get_mut(&name) {
                    Some(topic) => {
                        unlink(topic, subscriber);
                    }
                    None => subscriber.remove_topic(&name),
                }
            }
        }
        drained
    }

    pub fn member_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, Topic::member_count)
    }

    /// Checks the sender's membership, appends the history record and returns
    /// the recipients, sender included.
    pub fn record_broadcast(&mut self, message: &Message) -> Result<Vec<Arc<Subscriber>>, BrokerError> {
        let topic = self
            .topics
            .get(&message.topic)
            .filter(|topic| topic.is_member(&message.sender))
            .ok_or_else(|| BrokerError::NotSubscribed {
                sender: message.sender.clone(),
                topic: message.topic.clone(),
            })?;

        let recipients = topic.members();
        self.history
            .append(&message.topic, HistoryRecord::from(message));
        Ok(recipients)
    }

    /// Direct addressing: `sender` must be a member of the topic named after
    /// `receiver`, and `receiver` must be attached.
    pub fn direct_target(&self, sender: &str, receiver: &str) -> Result<Arc<Subscriber>, BrokerError> {
        let permitted = self
            .topics
            .get(receiver)
            .is_some_and(|topic| topic.is_member(sender));

        permitted
            .then(|| self.subscribers.get(receiver).cloned())
            .flatten()
            .ok_or_else(|| BrokerError::NotSubscribed {
                sender: sender.to_string(),
                topic: receiver.to_string(),
            })
    }

    pub fn history(&self, topic: &str) -> Vec<HistoryRecord> {
        self.history.get(topic)
    }

    fn authorize(&mut self, topic: &str, admin: &str) -> Result<&mut Topic, BrokerError> {
        self.topics
            .get_mut(topic)
            .filter(|group| group.is_admin(admin))
            .ok_or_else(|| BrokerError::NotAuthorized {
                admin: admin.to_string(),
                topic: topic.to_string(),
            })
    }
}

/// Adds the membership edge to both indexes.
fn link(topic: &mut Topic, subscriber: &Arc<Subscriber>) {
    topic.admit(Arc::clone(subscriber));
    subscriber.add_topic(&topic.name);
}

/// Removes the membership edge from both indexes. Returns whether the topic
/// held this very handle.
fn unlink(topic: &mut Topic, subscriber: &Arc<Subscriber>) -> bool {
    let removed = topic.remove(subscriber);
    subscriber.remove_topic(&topic.name);
    removed
}

fn ensure_live(subscriber: &Subscriber) -> Result<(), BrokerError> {
    if subscriber.is_closed() {
        return Err(BrokerError::Detached {
            subscriber: subscriber.name().to_string(),
        });
    }
    Ok(())
}
