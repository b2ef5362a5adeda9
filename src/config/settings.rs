use std::time::Duration;

use serde::Deserialize;

/// Everything `huddle server` reads at startup: where to listen, how the
/// broker sizes and times out inboxes, and the default log level.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Listen address of the WebSocket front end.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Inbox sizing and delivery timing, plus the optional history store.
///
/// `inbox_capacity` bounds every subscriber's inbox (clamped to at least 1).
/// `delivery_timeout_ms` bounds how long a delivery to a full inbox may wait;
/// `0` waits until the subscriber is destroyed. `history_path`, when set,
/// mirrors topic history into a sled database at that path.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub inbox_capacity: usize,
    pub delivery_timeout_ms: u64,
    pub history_path: Option<String>,
}

impl BrokerSettings {
    pub fn inbox_capacity(&self) -> usize {
        self.inbox_capacity.max(1)
    }

    pub fn delivery_timeout(&self) -> Option<Duration> {
        match self.delivery_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// `level` is the fallback filter; `RUST_LOG` overrides it.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Shape of the config file and `HUDDLE_*` variables before merging. Any
/// section or key may be absent; `merge` fills the gaps from `Settings::default`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub inbox_capacity: Option<usize>,
    pub delivery_timeout_ms: Option<u64>,
    pub history_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            inbox_capacity: 64,
            delivery_timeout_ms: 5_000,
            history_path: None,
        }
    }
}

/// Listens on `127.0.0.1:8080`, keeps history in memory only and logs at `info`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            broker: BrokerSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
