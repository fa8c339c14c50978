//! # huddle-server
//!
//! The signaling relay proper.
//!
//! - [`registry`]: the shared session table and name claims
//! - [`websocket`]: per-connection loop, frame dispatch, broadcast fan-out
//! - [`server`]: axum router (`/ws`, `/health`, `/metrics`) and listener
//! - [`config`] / [`loader`]: configuration with file and environment layers
//! - [`shutdown`]: graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod loader;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use registry::{Session, SessionRegistry};
pub use server::RelayServer;
