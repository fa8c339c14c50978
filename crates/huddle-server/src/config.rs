//! Server configuration.

use huddle_telemetry::LoggingSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `8000`, `0` to auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Outbound frames buffered per connection before sends are dropped.
    pub send_queue_capacity: usize,
    /// Seconds between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence before a connection is closed.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Log level, format and per-module overrides.
    pub logging: LoggingSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            max_connections: 256,
            send_queue_capacity: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
            logging: LoggingSettings::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_telemetry::LogFormat;

    #[test]
    fn defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.max_connections, 256);
        assert_eq!(cfg.send_queue_capacity, 256);
        assert_eq!(cfg.heartbeat_interval_secs, 30);
        assert_eq!(cfg.heartbeat_timeout_secs, 90);
        assert_eq!(cfg.max_message_size, 65_536);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let cfg = ServerConfig {
            host: "127.0.0.1".into(),
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ServerConfig =
            serde_json::from_str(r#"{"port": 9100, "logging": {"format": "json"}}"#).unwrap();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
