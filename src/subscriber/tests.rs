use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::time::timeout;

use super::{Delivery, DropReason, Subscriber, Waiters};
use crate::broker::message::Message;

fn subscriber(name: &str, capacity: usize) -> Arc<Subscriber> {
    Arc::new(Subscriber::new(name, capacity))
}

#[test]
fn test_subscriber_new() {
    let alice = subscriber("alice", 4);
    assert_eq!(alice.name(), "alice");
    assert!(alice.topics().is_empty());
    assert!(!alice.is_closed());
    assert_eq!(alice.dropped(), 0);
    assert_eq!(alice.pending(), 0);
}

#[test]
fn test_topic_set_tracks_adds_and_removes() {
    let alice = subscriber("alice", 4);
    alice.add_topic("news");
    alice.add_topic("chat");
    alice.add_topic("news");

    assert_eq!(alice.topics(), vec!["chat".to_string(), "news".to_string()]);
    assert!(alice.is_subscribed("chat"));

    alice.remove_topic("chat");
    alice.remove_topic("missing");
    assert_eq!(alice.topics(), vec!["news".to_string()]);
}

#[test]
fn test_deliver_checks_membership_for_broadcasts_only() {
    let alice = subscriber("alice", 4);
    let mut inbox = alice.take_inbox().unwrap();

    let stale = Message::broadcast("news", "bob", "late");
    assert_eq!(
        alice.deliver(stale, None, &Waiters::new()),
        Delivery::Dropped(DropReason::NotMember)
    );

    let direct = Message::direct("alice", "bob", "psst");
    assert_eq!(alice.deliver(direct, None, &Waiters::new()), Delivery::Queued);
    assert_eq!(inbox.try_recv().unwrap().payload, "psst");
    assert_eq!(alice.dropped(), 0);
}

#[test]
fn test_destroy_is_idempotent_and_drops_later_deliveries() {
    let alice = subscriber("alice", 4);
    alice.add_topic("news");
    let mut inbox = alice.take_inbox().unwrap();

    alice.destroy();
    alice.destroy();
    assert!(alice.is_closed());

    let delivery = alice.deliver(Message::broadcast("news", "bob", "hi"), None, &Waiters::new());
    assert_eq!(delivery, Delivery::Dropped(DropReason::Closed));
    assert_eq!(alice.dropped(), 1);
    assert!(inbox.try_recv().is_err());
}

#[tokio::test]
async fn test_inbox_is_a_stream_that_ends_on_destroy() {
    let alice = subscriber("alice", 4);
    alice.add_topic("news");
    let mut inbox = alice.take_inbox().unwrap();
    assert_eq!(inbox.name(), "alice");

    for payload in ["one", "two"] {
        let delivery = alice.deliver(Message::broadcast("news", "bob", payload), None, &Waiters::new());
        assert_eq!(delivery, Delivery::Queued);
    }
    assert_eq!(inbox.len(), 2);
    alice.destroy();

    let received: Vec<_> = timeout(Duration::from_secs(1), inbox.by_ref().collect::<Vec<_>>())
        .await
        .unwrap();
    let payloads: Vec<_> = received.iter().map(|m| m.payload.as_str()).collect();
    assert_eq!(payloads, vec!["one", "two"]);
    assert!(inbox.is_empty());
}

#[tokio::test]
async fn test_full_inbox_defers_delivery() {
    let alice = subscriber("alice", 1);
    alice.add_topic("news");
    let mut inbox = alice.take_inbox().unwrap();

    assert_eq!(
        alice.deliver(Message::broadcast("news", "bob", "one"), None, &Waiters::new()),
        Delivery::Queued
    );
    assert_eq!(
        alice.deliver(Message::broadcast("news", "bob", "two"), None, &Waiters::new()),
        Delivery::Deferred
    );
    assert_eq!(alice.pending(), 1);

    let wait = Duration::from_secs(1);
    assert_eq!(timeout(wait, inbox.recv()).await.unwrap().unwrap().payload, "one");
    assert_eq!(timeout(wait, inbox.recv()).await.unwrap().unwrap().payload, "two");
    assert_eq!(alice.pending(), 0);
}

#[test]
fn test_full_inbox_waits_on_owned_runtime_outside_tokio() {
    let waiters = Waiters::new();
    let alice = subscriber("alice", 1);
    alice.add_topic("news");
    let mut inbox = alice.take_inbox().unwrap();
    let wait = Some(Duration::from_secs(5));

    let one = alice.deliver(Message::broadcast("news", "bob", "one"), wait, &waiters);
    let two = alice.deliver(Message::broadcast("news", "bob", "two"), wait, &waiters);
    assert_eq!((one, two), (Delivery::Queued, Delivery::Deferred));

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut payloads = Vec::new();
    while payloads.len() < 2 && Instant::now() < deadline {
        match inbox.try_recv() {
            Ok(message) => payloads.push(message.payload),
            Err(_) => thread::sleep(Duration::from_millis(1)),
        }
    }
    assert_eq!(payloads, vec!["one".to_string(), "two".to_string()]);
    assert_eq!(alice.dropped(), 0);
}

#[test]
fn test_waiters_always_find_a_runtime() {
    assert!(Waiters::new().handle().is_some());
    assert!(Waiters::default().handle().is_some());
}
