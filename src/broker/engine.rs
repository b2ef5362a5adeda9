//! Broker engine
//!
//! `Broker` is the façade over the topic registry. It is a cheap, cloneable
//! context object: construct one, pass clones to whoever needs it, call
//! [`Broker::shutdown`] when done. There is no global state.
//!
//! Concurrency and usage notes:
//! - All registry state sits behind one `RwLock`. Mutations take the write
//!   lock and do their check-and-act inside it; counts and history take the
//!   read lock. The registry lock is always taken before a subscriber's own
//!   topic-set lock.
//! - Nothing is ever written into an inbox while the registry lock is held.
//!   `broadcast` and `send` collect their recipients under the lock, release
//!   it, then hand each recipient its copy independently.
//! - A full inbox never blocks the caller: the delivery waits on a background
//!   task, bounded by `delivery_timeout` and cancelled by `destroy`. That task
//!   runs on the caller's runtime, else on the runtime the broker was built
//!   in, else on a small runtime the broker starts for itself.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::broker::history::HistoryLog;
use crate::broker::message::{HistoryRecord, Message};
use crate::broker::registry::Registry;
use crate::config::{BrokerSettings, Settings};
use crate::persistence::Persistence;
use crate::subscriber::{Delivery, Subscriber, Waiters};
use crate::utils::error::{BrokerError, PersistenceError};

#[derive(Debug, Clone)]
pub struct Broker {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    registry: RwLock<Registry>,
    inbox_capacity: usize,
    delivery_timeout: Option<Duration>,
    waiters: Waiters,
    persistence: Option<Persistence>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(&BrokerSettings::default())
    }
}

impl Broker {
    /// In-memory broker; history lives as long as the broker.
    pub fn new(settings: &BrokerSettings) -> Self {
        Self::assemble(settings, HistoryLog::new(), None)
    }

    /// Broker whose history is mirrored into `persistence`. Records already
    /// stored there are loaded first.
    pub fn with_persistence(
        settings: &BrokerSettings,
        persistence: Persistence,
    ) -> Result<Self, PersistenceError> {
        let restored = persistence.load_all()?;
        info!(topics = restored.len(), "restored topic history");
        Ok(Self::assemble(
            settings,
            HistoryLog::restore(restored),
            Some(persistence),
        ))
    }

    /// Builds the broker described by `settings`, opening the history store
    /// when `broker.history_path` is set.
    pub fn from_settings(settings: &Settings) -> Result<Self, PersistenceError> {
        match &settings.broker.history_path {
            Some(path) => {
                let persistence = Persistence::open(path)?;
                Self::with_persistence(&settings.broker, persistence)
            }
            None => Ok(Self::new(&settings.broker)),
        }
    }

    fn assemble(
        settings: &BrokerSettings,
        history: HistoryLog,
        persistence: Option<Persistence>,
    ) -> Self {
        let inbox_capacity = settings.inbox_capacity();
        Self {
            shared: Arc::new(Shared {
                registry: RwLock::new(Registry::new(inbox_capacity, history)),
                inbox_capacity,
                delivery_timeout: settings.delivery_timeout(),
                waiters: Waiters::new(),
                persistence,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.shared
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.shared
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a subscriber called `name` and returns its handle.
    ///
    /// Attaching a name that is already attached replaces the old handle: its
    /// memberships move to the new handle and its inbox is closed.
    pub fn attach(&self, name: &str) -> Arc<Subscriber> {
        let subscriber = Arc::new(Subscriber::new(name, self.shared.inbox_capacity));
        let previous = self.write().attach(Arc::clone(&subscriber));

        if let Some(previous) = previous {
            previous.destroy();
            info!(subscriber = name, "re-attached, previous handle closed");
        } else {
            info!(subscriber = name, "attached");
        }
        subscriber
    }

    /// Removes the subscriber from the table and from every topic, then
    /// closes its inbox.
    pub fn detach(&self, subscriber: &Arc<Subscriber>) {
        let topics = self.write().detach(subscriber);
        subscriber.destroy();
        info!(subscriber = subscriber.name(), left = topics.len(), "detached");
    }

    /// Creates a topic unless one with that name exists. `limit` of `0` means
    /// unlimited. A non-empty `admin` becomes the first admin and first member
    /// (attached on the spot if needed).
    pub fn create_topic(&self, name: &str, limit: usize, admin: Option<&str>) {
        if self.write().create_topic(name, limit, admin) {
            info!(topic = name, limit, admin = admin.unwrap_or_default(), "topic created");
        } else {
            debug!(topic = name, "topic already exists");
        }
    }

    pub fn subscribe(&self, subscriber: &Arc<Subscriber>, topic: &str) -> Result<(), BrokerError> {
        self.write().subscribe(subscriber, topic)?;
        debug!(subscriber = subscriber.name(), topic, "subscribed");
        Ok(())
    }

    /// No-op when the topic is unknown or the subscriber is not a member.
    pub fn unsubscribe(&self, subscriber: &Arc<Subscriber>, topic: &str) {
        if self.write().unsubscribe(subscriber, topic) {
            debug!(subscriber = subscriber.name(), topic, "unsubscribed");
        }
    }

    /// Joins a group sponsored by `admin`. With `promote`, the subscriber also
    /// becomes an admin of the group.
    pub fn join_group(
        &self,
        subscriber: &Arc<Subscriber>,
        topic: &str,
        admin: &str,
        promote: bool,
    ) -> Result<(), BrokerError> {
        let joined = self.write().join_group(subscriber, topic, admin, promote);
        match &joined {
            Ok(()) => info!(subscriber = subscriber.name(), topic, admin, promote, "joined group"),
            Err(err) => warn!(subscriber = subscriber.name(), topic, reason = err.as_label(), "join rejected"),
        }
        joined
    }

    pub fn leave_group(
        &self,
        subscriber: &Arc<Subscriber>,
        topic: &str,
        admin: &str,
    ) -> Result<(), BrokerError> {
        let left = self.write().leave_group(subscriber, topic, admin);
        match &left {
            Ok(()) => info!(subscriber = subscriber.name(), topic, admin, "left group"),
            Err(err) => warn!(subscriber = subscriber.name(), topic, reason = err.as_label(), "leave rejected"),
        }
        left
    }

    /// Posts `payload` to every member of `topic`, the sender included.
    ///
    /// Returns once every delivery is handed off, not when it is received.
    pub fn broadcast(&self, payload: &str, sender: &str, topic: &str) -> Result<(), BrokerError> {
        let message = Message::broadcast(topic, sender, payload);

        let recipients = {
            let mut registry = self.write();
            let recipients = registry.record_broadcast(&message)?;
            self.persist(topic, &message);
            recipients
        };

        let mut deferred = 0;
        for recipient in &recipients {
            let delivery = recipient.deliver(
                message.clone(),
                self.shared.delivery_timeout,
                &self.shared.waiters,
            );
            if delivery == Delivery::Deferred {
                deferred += 1;
            }
        }
        debug!(topic, sender, recipients = recipients.len(), deferred, "broadcast");
        Ok(())
    }

    /// Sends `payload` to `receiver` alone. Allowed only when `sender` is a
    /// member of the topic named after `receiver`.
    pub fn send(&self, payload: &str, sender: &str, receiver: &str) -> Result<(), BrokerError> {
        let target = self.read().direct_target(sender, receiver)?;

        let delivery = target.deliver(
            Message::direct(receiver, sender, payload),
            self.shared.delivery_timeout,
            &self.shared.waiters,
        );
        debug!(sender, receiver, ?delivery, "direct send");
        Ok(())
    }

    pub fn get_history(&self, topic: &str) -> Vec<HistoryRecord> {
        self.read().history(topic)
    }

    pub fn member_count(&self, topic: &str) -> usize {
        self.read().member_count(topic)
    }

    pub fn subscriber(&self, name: &str) -> Option<Arc<Subscriber>> {
        self.read().subscriber(name)
    }

    pub fn is_member(&self, topic: &str, name: &str) -> bool {
        self.read()
            .topic(topic)
            .is_some_and(|topic| topic.is_member(name))
    }

    /// Admin names of `topic` in grant order; empty for plain or unknown topics.
    pub fn admins(&self, topic: &str) -> Vec<String> {
        self.read()
            .topic(topic)
            .map(|topic| topic.admins().to_vec())
            .unwrap_or_default()
    }

    pub fn topics(&self) -> Vec<String> {
        self.read().topic_names()
    }

    /// Detaches every subscriber, closing all inboxes, and flushes the history
    /// store. Topics and history stay readable.
    pub fn shutdown(&self) {
        let drained = self.write().drain_subscribers();
        for subscriber in &drained {
            subscriber.destroy();
        }

        if let Some(persistence) = &self.shared.persistence {
            if let Err(e) = persistence.flush() {
                error!("Failed to flush history store: {e}");
            }
        }
        info!(subscribers = drained.len(), "broker shut down");
    }

    // Runs under the registry write lock so the store sees records in the
    // same order as the in-memory log.
    fn persist(&self, topic: &str, message: &Message) {
        if let Some(persistence) = &self.shared.persistence {
            if let Err(e) = persistence.append(topic, &HistoryRecord::from(message)) {
                error!(topic, reason = e.as_label(), "Failed to persist history record: {e}");
            }
        }
    }
}
