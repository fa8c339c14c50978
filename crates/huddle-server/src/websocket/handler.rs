//! Per-frame dispatch: decode one inbound frame and act on it.

use std::sync::Arc;

use huddle_core::{
    ClientMessage, MessageType, PeerExchange, PeerTarget, RelayError, ServerMessage, SessionId,
};
use metrics::{counter, gauge};
use tracing::{debug, info, warn};

use super::broadcast::broadcast_to_others;
use crate::metrics::{MESSAGES_FORWARDED_TOTAL, MESSAGES_RECEIVED_TOTAL, PEERS_ACTIVE};
use crate::registry::{Session, SessionRegistry};

/// What a successfully handled frame did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// A peer-exchange message was routed to `target`.
    Forwarded {
        /// Message type.
        kind: MessageType,
        /// Receiving session.
        target: SessionId,
        /// Whether the target's queue accepted it.
        delivered: bool,
    },
    /// The sender claimed `name`; `notified` others were told.
    Joined {
        /// Claimed name.
        name: String,
        /// Sessions offered the `peer-joined` broadcast.
        notified: usize,
    },
    /// The sender left the peer stream. `None` if it had not joined.
    Left {
        /// Sessions offered the `peer-left` broadcast.
        notified: Option<usize>,
    },
    /// Known server-bound type or unknown type; logged only.
    Ignored {
        /// The frame's `type` string.
        kind: String,
    },
}

/// Handle one inbound text frame from `sender`.
///
/// An `Err` is meant to be answered with an `error` frame to the sender; the
/// connection stays open either way.
pub fn handle_message(
    raw: &str,
    sender: &Session,
    registry: &SessionRegistry,
) -> Result<Dispatched, RelayError> {
    let message = ClientMessage::decode(raw)?;
    let label = message
        .message_type()
        .map_or("unknown", MessageType::as_str);
    counter!(MESSAGES_RECEIVED_TOTAL, "type" => label).increment(1);

    match message {
        ClientMessage::PeerExchange(exchange) => forward(exchange, sender, registry),
        ClientMessage::JoinPeers { name } => join(&name, sender, registry),
        ClientMessage::LeavePeers => Ok(leave(sender, registry)),
        ClientMessage::Unsupported(kind) => {
            warn!(session_id = %sender.id(), message_type = %kind, "client sent a server-only message type");
            Ok(Dispatched::Ignored {
                kind: kind.as_str().to_owned(),
            })
        }
        ClientMessage::Unknown(kind) => {
            info!(session_id = %sender.id(), message_type = %kind, "unknown message type");
            Ok(Dispatched::Ignored { kind })
        }
    }
}

fn resolve(target: &PeerTarget, registry: &SessionRegistry) -> Option<Arc<Session>> {
    match target {
        PeerTarget::Id(id) => registry.lookup_by_id(*id),
        PeerTarget::Name(name) => registry.lookup_by_name(name),
    }
}

fn forward(
    mut exchange: PeerExchange,
    sender: &Session,
    registry: &SessionRegistry,
) -> Result<Dispatched, RelayError> {
    let kind = MessageType::from(exchange.kind);
    let Some(target) = resolve(&exchange.receiver_id, registry) else {
        return Err(RelayError::UnknownTarget(exchange.receiver_id));
    };

    exchange.stamp_sender(sender.id(), sender.name());
    let json = serde_json::to_string(&exchange).map_err(RelayError::Encode)?;
    let delivered = target.connection().send(Arc::new(json));
    if delivered {
        counter!(MESSAGES_FORWARDED_TOTAL, "type" => kind.as_str()).increment(1);
        debug!(
            session_id = %sender.id(),
            target_id = %target.id(),
            message_type = %kind,
            "forwarded peer message"
        );
    } else {
        warn!(
            session_id = %sender.id(),
            target_id = %target.id(),
            message_type = %kind,
            "target queue refused peer message"
        );
    }
    Ok(Dispatched::Forwarded {
        kind,
        target: target.id(),
        delivered,
    })
}

fn join(name: &str, sender: &Session, registry: &SessionRegistry) -> Result<Dispatched, RelayError> {
    registry.claim_name(sender.id(), name)?;
    gauge!(PEERS_ACTIVE).set(registry.active_count() as f64);
    info!(session_id = %sender.id(), name, "peer joined");

    let report = broadcast_to_others(
        registry,
        sender.id(),
        &ServerMessage::PeerJoined {
            id: sender.id(),
            name: name.to_owned(),
        },
    );
    Ok(Dispatched::Joined {
        name: name.to_owned(),
        notified: report.recipients,
    })
}

fn leave(sender: &Session, registry: &SessionRegistry) -> Dispatched {
    let Some(previous) = registry.release_name(sender.id()) else {
        debug!(session_id = %sender.id(), "leave-peers without a name");
        return Dispatched::Left { notified: None };
    };
    gauge!(PEERS_ACTIVE).set(registry.active_count() as f64);
    info!(session_id = %sender.id(), name = %previous, "peer left");

    let report = broadcast_to_others(
        registry,
        sender.id(),
        &ServerMessage::PeerLeft { id: sender.id() },
    );
    Dispatched::Left {
        notified: Some(report.recipients),
    }
}
