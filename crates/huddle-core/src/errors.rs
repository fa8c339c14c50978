//! Per-message failures.
//!
//! None of these end a connection. Each one is answered with an `error`
//! frame to the sender whose `errorMessage` is the `Display` text below.

use thiserror::Error;

use crate::protocol::PeerTarget;

/// Why a name claim was refused.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// The requested name was empty or whitespace.
    #[error("name cannot be blank")]
    Blank,
    /// Another session already holds the name.
    #[error("name already taken: {0}")]
    Duplicate(String),
    /// The claiming session is no longer registered.
    #[error("session is not registered")]
    NotRegistered,
}

/// Failure while handling one inbound frame.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The frame is not a JSON object with a string `type`.
    #[error("invalid message")]
    Malformed(#[source] serde_json::Error),
    /// The frame does not match the shape of its declared type.
    #[error("invalid {kind} message: {source}")]
    InvalidShape {
        /// Declared message type.
        kind: &'static str,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// The addressed receiver is not connected.
    #[error("invalid message target: {0}")]
    UnknownTarget(PeerTarget),
    /// `join-peers` was refused.
    #[error("failed to join peer-to-peer stream: {0}")]
    Join(#[from] ClaimError),
    /// An outbound frame could not be serialized.
    #[error("failed to encode message")]
    Encode(#[source] serde_json::Error),
}

impl RelayError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::InvalidShape { .. } => "invalid_shape",
            Self::UnknownTarget(_) => "unknown_target",
            Self::Join(ClaimError::Blank) => "blank_name",
            Self::Join(ClaimError::Duplicate(_)) => "duplicate_name",
            Self::Join(ClaimError::NotRegistered) => "not_registered",
            Self::Encode(_) => "encode",
        }
    }
}
