//! Graceful shutdown through a shared `CancellationToken`.
//!
//! The server's accept loop and every connection loop hold a clone of the
//! token. Cancelling it stops new upgrades, ends each connection's read loop
//! (which runs the normal unregister and `peer-left` path), and lets axum
//! finish in-flight HTTP requests.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long [`ShutdownCoordinator::drain`] waits by default.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owner of the relay-wide shutdown token.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the token for a task to observe.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token. Idempotent.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!("shutdown requested");
        }
        self.token.cancel();
    }

    /// Wait for Ctrl-C, or for someone else to trigger shutdown.
    pub async fn wait_for_signal(&self) {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    warn!(%error, "failed to listen for ctrl-c");
                }
            }
            () = self.token.cancelled() => {}
        }
        self.trigger();
    }

    /// Trigger shutdown and wait up to `timeout` for the server task.
    ///
    /// Returns `false` if the task had to be aborted.
    pub async fn drain(&self, server: JoinHandle<()>, timeout: Duration) -> bool {
        self.trigger();
        let abort = server.abort_handle();
        match tokio::time::timeout(timeout, server).await {
            Ok(_) => {
                info!("server drained");
                true
            }
            Err(_) => {
                warn!(?timeout, "server did not drain in time, aborting");
                abort.abort();
                false
            }
        }
    }
}
