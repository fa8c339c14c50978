//! # huddle-telemetry
//!
//! Installs the global `tracing` subscriber for the relay.
//!
//! - `EnvFilter` from `RUST_LOG`, falling back to the configured level and
//!   per-module overrides
//! - human-readable or JSON output on stdout

#![deny(unsafe_code)]

mod filter;

pub use filter::{build_directives, parse_level};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Output format of the stdout log layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging section of the relay configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level. Overridden entirely by `RUST_LOG` when set.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Per-module level overrides (e.g. `huddle_server` → `debug`).
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
            modules: BTreeMap::new(),
        }
    }
}

/// Errors from subscriber setup.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A filter directive did not parse.
    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),
    /// A global subscriber was already installed.
    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Install the global subscriber. Call once at startup.
pub fn init_telemetry(settings: &LoggingSettings) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(build_directives(&settings.level, &settings.modules))?,
    };

    let (pretty_layer, json_layer) = match settings.format {
        LogFormat::Pretty => (Some(fmt::layer().with_target(true)), None),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_target(true).with_span_list(true)),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty_layer)
        .with(json_layer)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let settings = LoggingSettings::default();
        assert_eq!(settings.level, "info");
        assert_eq!(settings.format, LogFormat::Pretty);
        assert!(settings.modules.is_empty());
    }

    #[test]
    fn settings_deserialize_with_partial_fields() {
        let settings: LoggingSettings =
            serde_json::from_str(r#"{"format":"json","modules":{"huddle_server":"debug"}}"#)
                .unwrap();
        assert_eq!(settings.level, "info");
        assert_eq!(settings.format, LogFormat::Json);
        assert_eq!(settings.modules["huddle_server"], "debug");
    }

    #[test]
    fn unknown_format_rejected() {
        let result: Result<LoggingSettings, _> = serde_json::from_str(r#"{"format":"xml"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn second_install_is_rejected() {
        let settings = LoggingSettings::default();
        init_telemetry(&settings).unwrap();
        let err = init_telemetry(&settings).unwrap_err();
        assert!(matches!(err, TelemetryError::Init(_)));
        assert!(err.to_string().starts_with("failed to install subscriber"));
    }
}
