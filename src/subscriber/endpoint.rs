use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broker::message::{Message, MessageKind};
use crate::subscriber::inbox::{Delivery, DropReason, Inbox};
use crate::subscriber::waiters::Waiters;

pub type SubscriberId = String;

/// A named endpoint attached to the broker.
///
/// The subscriber owns its topic set (guarded by its own lock, always taken
/// after the registry lock) and the send half of a bounded inbox. The receive
/// half is handed out once through [`Subscriber::take_inbox`].
///
/// `closed` doubles as the cancel signal for deliveries that are waiting for
/// room in a full inbox.
#[derive(Debug)]
pub struct Subscriber {
    name: SubscriberId,
    topics: RwLock<HashSet<String>>,
    outbox: Mutex<Option<mpsc::Sender<Message>>>,
    inbox: Mutex<Option<Inbox>>,
    closed: watch::Sender<bool>,
    dropped: AtomicU64,
    pending: AtomicUsize,
}

impl Subscriber {
    pub(crate) fn new(name: &str, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (closed, _) = watch::channel(false);

        Self {
            name: name.to_string(),
            topics: RwLock::new(HashSet::new()),
            outbox: Mutex::new(Some(tx)),
            inbox: Mutex::new(Some(Inbox::new(name, rx))),
            closed,
            dropped: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the topics this subscriber belongs to, sorted by name.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        topics.sort();
        topics
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(topic)
    }

    pub(crate) fn add_topic(&self, topic: &str) {
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.to_string());
    }

    pub(crate) fn remove_topic(&self, topic: &str) {
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic);
    }

    /// Takes the receive half of the inbox. Only the first call gets it.
    pub fn take_inbox(&self) -> Option<Inbox> {
        self.inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Messages discarded because the inbox was closed or stayed full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Deliveries currently waiting for room in the inbox.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Closes the inbox. Repeat calls are no-ops.
    ///
    /// Pending deliveries are cancelled; the consumer drains what is already
    /// queued and then observes the end of the stream.
    pub fn destroy(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        drop(
            self.outbox
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        debug!(subscriber = %self.name, "inbox closed");
    }

    /// Hands `message` to this subscriber without blocking the caller.
    ///
    /// A full inbox moves the message to a task on `waiters` that waits for
    /// room until `timeout` elapses or the subscriber is destroyed.
    pub(crate) fn deliver(
        self: &Arc<Self>,
        message: Message,
        timeout: Option<Duration>,
        waiters: &Waiters,
    ) -> Delivery {
        if self.is_closed() {
            return self.discard(message.id, DropReason::Closed);
        }
        if message.kind == MessageKind::Broadcast && !self.is_subscribed(&message.topic) {
            return Delivery::Dropped(DropReason::NotMember);
        }

        let tx = self
            .outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(tx) = tx else {
            return self.discard(message.id, DropReason::Closed);
        };

        match tx.try_send(message) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Closed(message)) => self.discard(message.id, DropReason::Closed),
            Err(TrySendError::Full(message)) => self.defer(tx, message, timeout, waiters),
        }
    }

    fn defer(
        self: &Arc<Self>,
        tx: mpsc::Sender<Message>,
        message: Message,
        timeout: Option<Duration>,
        waiters: &Waiters,
    ) -> Delivery {
        let Some(runtime) = waiters.handle() else {
            return self.discard(message.id, DropReason::NoRuntime);
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        let closed = self.closed.subscribe();
        let subscriber = Arc::clone(self);

        runtime.spawn(async move {
            let message_id = message.id;
            let outcome = tokio::select! {
                _ = closed_signal(closed) => Err(DropReason::Closed),
                sent = send_within(&tx, message, timeout) => sent,
            };
            subscriber.pending.fetch_sub(1, Ordering::SeqCst);
            if let Err(reason) = outcome {
                subscriber.discard(message_id, reason);
            }
        });

        debug!(subscriber = %self.name, "inbox full, delivery deferred");
        Delivery::Deferred
    }

    fn discard(&self, message_id: Uuid, reason: DropReason) -> Delivery {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        match reason {
            DropReason::Closed => {
                debug!(subscriber = %self.name, %message_id, "dropped message for closed inbox")
            }
            _ => warn!(
                subscriber = %self.name,
                %message_id,
                ?reason,
                "dropped message, inbox is not being drained"
            ),
        }
        Delivery::Dropped(reason)
    }
}

async fn closed_signal(mut closed: watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

async fn send_within(
    tx: &mpsc::Sender<Message>,
    message: Message,
    timeout: Option<Duration>,
) -> Result<(), DropReason> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, tx.send(message)).await {
            Ok(sent) => sent.map_err(|_| DropReason::Closed),
            Err(_) => Err(DropReason::TimedOut),
        },
        None => tx.send(message).await.map_err(|_| DropReason::Closed),
    }
}
