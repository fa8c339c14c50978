//! # huddle-core
//!
//! Transport-independent building blocks of the signaling relay.
//!
//! - [`ids`]: process-unique session identifiers
//! - [`protocol`]: the JSON message shapes and two-phase frame decoding
//! - [`errors`]: per-message failure taxonomy reported back to clients

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod protocol;

pub use errors::{ClaimError, RelayError};
pub use ids::SessionId;
pub use protocol::{ClientMessage, ExchangeKind, MessageType, PeerExchange, PeerTarget, ServerMessage};
