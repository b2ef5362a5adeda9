//! Inbox: the receive half of a subscriber's bounded delivery queue.
//!
//! Exactly one consumer owns an [`Inbox`]; it is taken once from the
//! subscriber handle. After the subscriber is destroyed the inbox yields the
//! messages already queued and then `None`.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::broker::message::Message;

#[derive(Debug)]
pub struct Inbox {
    name: String,
    rx: mpsc::Receiver<Message>,
}

impl Inbox {
    pub(crate) fn new(name: &str, rx: mpsc::Receiver<Message>) -> Self {
        Self {
            name: name.to_string(),
            rx,
        }
    }

    /// Name of the subscriber this inbox belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for the next message. `None` once the subscriber is destroyed
    /// and the queue is drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Message, TryRecvError> {
        self.rx.try_recv()
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Stream for Inbox {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Outcome of handing one message to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message is in the inbox.
    Queued,
    /// The inbox was full; a background task is waiting for room.
    Deferred,
    /// The message was discarded.
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The subscriber was destroyed.
    Closed,
    /// The subscriber left the topic before the message reached it.
    NotMember,
    /// The inbox stayed full for the whole delivery timeout.
    TimedOut,
    /// The inbox was full and no runtime could be found or started to wait on it.
    NoRuntime,
}
