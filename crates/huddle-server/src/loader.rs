//! Configuration loading with deep merge and environment overrides.
//!
//! Layers, lowest priority first:
//! 1. compiled [`ServerConfig::default()`]
//! 2. a JSON settings file, deep-merged over the defaults (optional)
//! 3. `HUDDLE_*` environment variables
//!
//! Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use huddle_telemetry::{LogFormat, parse_level};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::errors::{ConfigError, Result};

/// Environment variable naming an alternative settings file.
pub const CONFIG_PATH_ENV: &str = "HUDDLE_CONFIG";

/// Settings file used when neither the CLI nor [`CONFIG_PATH_ENV`] names one.
pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV).map_or_else(|| PathBuf::from("huddle.json"), PathBuf::from)
}

/// Load configuration from `path` (or the default path) plus the process
/// environment.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let path = path.map_or_else(default_config_path, Path::to_path_buf);
    load_config_with(&path, |key| std::env::var(key).ok())
}

/// Load configuration from `path`, reading overrides through `env`.
///
/// A missing file yields defaults; an unreadable or malformed one is an
/// error.
pub fn load_config_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<ServerConfig> {
    let defaults = serde_json::to_value(ServerConfig::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading config file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "config file not found, using defaults");
        defaults
    };

    let mut config: ServerConfig = serde_json::from_value(merged)?;
    apply_overrides(&mut config, env);
    validate(&config)?;
    Ok(config)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key, arrays and primitives in `source` replace
/// `target`, and `null` in `source` leaves `target` untouched.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `HUDDLE_*` overrides read through `env`.
///
/// Out-of-range or unparsable values are ignored with a warning.
pub fn apply_overrides(config: &mut ServerConfig, env: impl Fn(&str) -> Option<String>) {
    let read = |key: &str| env(key).filter(|v| !v.is_empty());

    if let Some(v) = read("HUDDLE_HOST") {
        config.host = v;
    }
    if let Some(v) = read("HUDDLE_PORT").and_then(|v| checked("HUDDLE_PORT", &v, parse_u16_range(&v, 0, 65535))) {
        config.port = v;
    }
    if let Some(v) = read("HUDDLE_MAX_CONNECTIONS")
        .and_then(|v| checked("HUDDLE_MAX_CONNECTIONS", &v, parse_usize_range(&v, 1, 100_000)))
    {
        config.max_connections = v;
    }
    if let Some(v) = read("HUDDLE_SEND_QUEUE_CAPACITY")
        .and_then(|v| checked("HUDDLE_SEND_QUEUE_CAPACITY", &v, parse_usize_range(&v, 1, 65_536)))
    {
        config.send_queue_capacity = v;
    }
    if let Some(v) = read("HUDDLE_HEARTBEAT_INTERVAL_SECS")
        .and_then(|v| checked("HUDDLE_HEARTBEAT_INTERVAL_SECS", &v, parse_u64_range(&v, 1, 3_600)))
    {
        config.heartbeat_interval_secs = v;
    }
    if let Some(v) = read("HUDDLE_HEARTBEAT_TIMEOUT_SECS")
        .and_then(|v| checked("HUDDLE_HEARTBEAT_TIMEOUT_SECS", &v, parse_u64_range(&v, 1, 86_400)))
    {
        config.heartbeat_timeout_secs = v;
    }
    if let Some(v) = read("HUDDLE_MAX_MESSAGE_SIZE").and_then(|v| {
        checked(
            "HUDDLE_MAX_MESSAGE_SIZE",
            &v,
            parse_usize_range(&v, 1024, 64 * 1024 * 1024),
        )
    }) {
        config.max_message_size = v;
    }
    if let Some(v) = read("HUDDLE_LOG_LEVEL")
        .and_then(|v| checked("HUDDLE_LOG_LEVEL", &v, parse_level(&v).map(|_| v.to_lowercase())))
    {
        config.logging.level = v;
    }
    if let Some(v) = read("HUDDLE_LOG_FORMAT")
        .and_then(|v| checked("HUDDLE_LOG_FORMAT", &v, parse_log_format(&v)))
    {
        config.logging.format = v;
    }
}

/// Reject combinations no connection could run with.
pub fn validate(config: &ServerConfig) -> Result<()> {
    if config.max_connections == 0 {
        return Err(ConfigError::InvalidValue("max_connections must be at least 1".into()));
    }
    if config.send_queue_capacity == 0 {
        return Err(ConfigError::InvalidValue(
            "send_queue_capacity must be at least 1".into(),
        ));
    }
    if config.heartbeat_interval_secs == 0 {
        return Err(ConfigError::InvalidValue(
            "heartbeat_interval_secs must be at least 1".into(),
        ));
    }
    if config.heartbeat_timeout_secs < config.heartbeat_interval_secs {
        return Err(ConfigError::InvalidValue(format!(
            "heartbeat_timeout_secs ({}) is shorter than heartbeat_interval_secs ({})",
            config.heartbeat_timeout_secs, config.heartbeat_interval_secs
        )));
    }
    if parse_level(&config.logging.level).is_none() {
        return Err(ConfigError::InvalidValue(format!(
            "unknown log level: {}",
            config.logging.level
        )));
    }
    Ok(())
}

fn checked<T>(key: &str, raw: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        warn!(key, value = raw, "invalid env var, ignoring");
    }
    parsed
}

/// Parse a log format name (`pretty` or `json`, case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_ascii_lowercase().as_str() {
        "pretty" | "text" => Some(LogFormat::Pretty),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}
