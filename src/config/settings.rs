use serde::Deserialize;

use crate::protocol::MAX_PAYLOAD_LEN;

/// Top-level configuration settings for the application.
///
/// Includes settings for the listening server, the broker and logging.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the listener binds to.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings for the broker.
///
/// `max_connections` caps concurrently open client connections;
/// `max_payload_len` caps the payload size accepted in one inbound frame;
/// `max_queued_frames` caps the frames waiting to be written to one
/// connection before it is dropped as too slow.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub max_connections: usize,
    pub max_payload_len: usize,
    pub max_queued_frames: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
    pub max_payload_len: Option<usize>,
    pub max_queued_frames: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Settings {
    /// `host:port` the listener binds to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Fill every value missing from `partial` with the default.
    pub fn merged(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let server = partial.server.as_ref();
        let broker = partial.broker.as_ref();

        Settings {
            server: ServerSettings {
                host: server
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server.and_then(|s| s.port).unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                max_connections: broker
                    .and_then(|b| b.max_connections)
                    .unwrap_or(default.broker.max_connections),
                max_payload_len: broker
                    .and_then(|b| b.max_payload_len)
                    .unwrap_or(default.broker.max_payload_len),
                max_queued_frames: broker
                    .and_then(|b| b.max_queued_frames)
                    .unwrap_or(default.broker.max_queued_frames),
            },
            log: LogSettings {
                level: partial
                    .log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "localhost".to_string(),
                port: 5000,
            },
            broker: BrokerSettings {
                max_connections: 1000,
                max_payload_len: MAX_PAYLOAD_LEN,
                max_queued_frames: 1024,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
