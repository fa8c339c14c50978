//! Configuration error types.

use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid JSON or has the wrong shape.
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is out of range or inconsistent with another.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn invalid_value_display() {
        let err = ConfigError::InvalidValue("port out of range".into());
        assert_eq!(err.to_string(), "invalid config value: port out of range");
    }

    #[test]
    fn conversions() {
        let io: ConfigError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_matches!(io, ConfigError::Io(_));
        let json: ConfigError = serde_json::from_str::<serde_json::Value>("{bad")
            .unwrap_err()
            .into();
        assert_matches!(json, ConfigError::Json(_));
        assert!(json.to_string().contains("parse config JSON"));
    }
}
