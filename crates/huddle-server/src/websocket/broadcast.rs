//! Fan-out of server messages to every session but the originator.

use std::sync::Arc;

use huddle_core::{ServerMessage, SessionId};
use metrics::counter;
use tracing::{debug, warn};

use crate::metrics::BROADCAST_DROPS_TOTAL;
use crate::registry::SessionRegistry;

/// Outcome of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions the message was offered to.
    pub recipients: usize,
    /// Recipients whose queue refused it.
    pub dropped: usize,
}

/// Send `message` to every registered session except `origin`.
///
/// The frame is encoded and allocated once. A recipient whose queue is full or closed is
/// skipped; the rest still receive it.
pub fn broadcast_to_others(
    registry: &SessionRegistry,
    origin: SessionId,
    message: &ServerMessage,
) -> BroadcastReport {
    let kind = message.message_type();
    let json = match serde_json::to_string(message) {
        Ok(json) => Arc::new(json),
        Err(error) => {
            warn!(%kind, %error, "failed to serialize broadcast");
            return BroadcastReport::default();
        }
    };

    let mut report = BroadcastReport::default();
    registry.for_each_other(origin, |session| {
        report.recipients += 1;
        if !session.connection().send(Arc::clone(&json)) {
            report.dropped += 1;
            counter!(BROADCAST_DROPS_TOTAL).increment(1);
            warn!(%kind, session_id = %session.id(), "failed to enqueue broadcast");
        }
    });
    debug!(
        %kind,
        origin = %origin,
        recipients = report.recipients,
        dropped = report.dropped,
        "broadcast to others"
    );
    report
}
