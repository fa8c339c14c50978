//! WebSocket connection handling, frame dispatch and broadcasting.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod session;
