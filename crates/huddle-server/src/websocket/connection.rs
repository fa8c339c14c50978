//! Outbound half of a peer connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use huddle_core::ServerMessage;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// Handle used to push frames to one connected client.
///
/// Frames go into a bounded queue drained by the connection's writer task.
/// Enqueueing never blocks, so it is safe to call while holding the
/// registry lock. Frames are shared, so a broadcast encodes and allocates
/// once for all recipients.
#[derive(Debug)]
pub struct PeerConnection {
    tx: mpsc::Sender<Arc<String>>,
    is_alive: AtomicBool,
    last_seen: Mutex<Instant>,
    dropped: AtomicU64,
}

impl PeerConnection {
    /// Wrap the sending side of a connection's outbound queue.
    pub fn new(tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            tx,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue an already-encoded text frame.
    ///
    /// Returns `false` when the queue is full or the writer has gone away.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Encode and enqueue a server message.
    pub fn send_message(&self, message: &ServerMessage) -> bool {
        match serde_json::to_string(message) {
            Ok(json) => self.send(Arc::new(json)),
            Err(error) => {
                warn!(%error, kind = %message.message_type(), "failed to encode server message");
                false
            }
        }
    }

    /// Frames that could not be enqueued.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record inbound traffic (any frame, including Pong).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound frame.
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Read and clear the alive flag. `true` if traffic arrived since the
    /// previous check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }
}
