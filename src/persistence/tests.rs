use tempfile::tempdir;

use super::Persistence;
use crate::broker::Broker;
use crate::broker::message::HistoryRecord;
use crate::config::BrokerSettings;

fn record(sender: &str, payload: &str, timestamp: i64) -> HistoryRecord {
    HistoryRecord {
        timestamp,
        sender: sender.to_string(),
        payload: payload.to_string(),
    }
}

#[test]
fn test_append_and_load_in_order() {
    let persistence = Persistence::temporary().unwrap();

    persistence.append("news", &record("alice", "one", 1)).unwrap();
    persistence.append("news", &record("bob", "two", 2)).unwrap();
    persistence.append("chat", &record("carol", "hi", 3)).unwrap();

    let news = persistence.load("news").unwrap();
    assert_eq!(news, vec![record("alice", "one", 1), record("bob", "two", 2)]);
    assert!(persistence.load("unknown").unwrap().is_empty());
}

#[test]
fn test_load_all_skips_foreign_trees() {
    let persistence = Persistence::temporary().unwrap();
    persistence.append("news", &record("alice", "one", 1)).unwrap();
    persistence.append("chat", &record("bob", "two", 2)).unwrap();

    let all = persistence.load_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["news"], vec![record("alice", "one", 1)]);
    assert_eq!(all["chat"], vec![record("bob", "two", 2)]);
}

#[test]
fn test_history_survives_broker_restart() {
    let dir = tempdir().unwrap();
    let persistence = Persistence::open(dir.path().to_str().unwrap()).unwrap();
    let settings = BrokerSettings::default();

    {
        let broker = Broker::with_persistence(&settings, persistence.clone()).unwrap();
        let alice = broker.attach("alice");
        broker.subscribe(&alice, "news").unwrap();
        broker.broadcast("first", "alice", "news").unwrap();
        broker.broadcast("second", "alice", "news").unwrap();
        broker.shutdown();
    }

    let broker = Broker::with_persistence(&settings, persistence).unwrap();
    let history = broker.get_history("news");
    let payloads: Vec<_> = history.iter().map(|r| r.payload.as_str()).collect();
    assert_eq!(payloads, vec!["first", "second"]);
    assert!(history.iter().all(|r| r.sender == "alice"));
    assert_eq!(broker.member_count("news"), 0);
}
