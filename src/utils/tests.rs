use super::error::BrokerError;
use super::logging;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("bogus");
}

#[test]
fn broker_error_labels_are_stable() {
    let err = BrokerError::LimitExceeded {
        topic: "team".to_string(),
        limit: 1,
    };
    assert_eq!(err.as_label(), "limit_exceeded");
    assert_eq!(err.to_string(), "team has reached its limit of 1 members");

    let err = BrokerError::NotAuthorized {
        admin: String::new(),
        topic: "news".to_string(),
    };
    assert_eq!(err.as_label(), "not_authorized");
    assert_eq!(err.to_string(), "\"\" is not an admin of news");
}
