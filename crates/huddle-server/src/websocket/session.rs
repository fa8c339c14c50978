//! Lifecycle of one WebSocket connection, from upgrade to cleanup.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use huddle_core::{RelayError, ServerMessage};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, error, info, instrument, warn};

use super::broadcast::broadcast_to_others;
use super::connection::PeerConnection;
use super::handler::handle_message;
use crate::config::ServerConfig;
use crate::metrics::{
    CONNECTION_DURATION_SECONDS, CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL, DISCONNECTIONS_TOTAL,
    MESSAGES_REJECTED_TOTAL, PEERS_ACTIVE,
};
use crate::registry::{Session, SessionRegistry};

/// Per-connection tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// Outbound queue depth.
    pub send_queue_capacity: usize,
    /// Interval between server Ping frames.
    pub heartbeat_interval: Duration,
    /// Silence after which the connection is dropped.
    pub heartbeat_timeout: Duration,
}

impl From<&ServerConfig> for SessionOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            send_queue_capacity: config.send_queue_capacity.max(1),
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs.max(1)),
            heartbeat_timeout: Duration::from_secs(config.heartbeat_timeout_secs.max(1)),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// Why the read loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    TransportError,
    WriterStopped,
    Shutdown,
}

impl CloseReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
            Self::WriterStopped => "writer_stopped",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Run one signaling session over an upgraded socket.
///
/// The greeting is queued before the session becomes visible in the
/// registry, so it is always the first frame the client sees. Cleanup runs
/// exactly once however the loop ends.
#[instrument(skip_all, fields(session_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    registry: Arc<SessionRegistry>,
    options: SessionOptions,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(options.send_queue_capacity);

    let connection = PeerConnection::new(send_tx);
    // Queue the greeting before registering so no broadcast can reach the
    // client ahead of it. A name claimed between this count and `register`
    // shows up in neither `peerCount` nor a `peer-joined` to this client.
    let peer_count = registry.active_count();
    let _ = connection.send_message(&ServerMessage::ConnectionSuccess { peer_count });
    let session = registry.register(connection);
    let session_id = session.id();
    let _ = Span::current().record("session_id", session_id.as_u64());

    let started = Instant::now();
    info!(peer_count, "session opened");
    counter!(CONNECTIONS_TOTAL).increment(1);
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);

    let outbound_session = Arc::clone(&session);
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(options.heartbeat_interval);
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(text) = frame else { break };
                    if ws_tx.send(Message::Text(Arc::unwrap_or_clone(text).into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    let conn = outbound_session.connection();
                    if !conn.check_alive() && conn.last_seen_elapsed() > options.heartbeat_timeout {
                        warn!(timeout = ?options.heartbeat_timeout, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let reason = loop {
        tokio::select! {
            () = shutdown.cancelled() => break CloseReason::Shutdown,
            _ = &mut outbound => break CloseReason::WriterStopped,
            frame = ws_rx.next() => match frame {
                None => break CloseReason::ClientClosed,
                Some(Err(error)) => {
                    warn!(%error, "websocket read failed");
                    break CloseReason::TransportError;
                }
                Some(Ok(Message::Text(text))) => dispatch(text.as_str(), &session, &registry),
                Some(Ok(Message::Binary(data))) => dispatch_binary(&data, &session, &registry),
                Some(Ok(Message::Close(_))) => {
                    debug!("client sent close frame");
                    break CloseReason::ClientClosed;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => session.connection().mark_alive(),
            },
        }
    };

    outbound.abort();
    if registry
        .unregister(session_id)
        .is_some_and(|removed| removed.is_peer())
    {
        gauge!(PEERS_ACTIVE).set(registry.active_count() as f64);
        let _ = broadcast_to_others(
            &registry,
            session_id,
            &ServerMessage::PeerLeft { id: session_id },
        );
    }

    info!(
        reason = reason.as_str(),
        dropped = session.connection().drop_count(),
        "session closed"
    );
    counter!(DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}

/// Handle one text frame, answering failures and panics with an `error`.
fn dispatch(raw: &str, session: &Session, registry: &SessionRegistry) {
    session.connection().mark_alive();
    match catch_unwind(AssertUnwindSafe(|| handle_message(raw, session, registry))) {
        Ok(Ok(outcome)) => debug!(?outcome, "frame handled"),
        Ok(Err(err)) => reject(session, &err),
        Err(_) => {
            error!("panic while handling frame");
            counter!(MESSAGES_REJECTED_TOTAL, "kind" => "panic").increment(1);
            let _ = session.send(&ServerMessage::Error {
                error_message: "internal error".into(),
            });
        }
    }
}

/// Handle one binary frame. UTF-8 payloads are treated as text; anything
/// else is answered as malformed.
fn dispatch_binary(data: &[u8], session: &Session, registry: &SessionRegistry) {
    if let Ok(text) = std::str::from_utf8(data) {
        dispatch(text, session, registry);
    } else {
        session.connection().mark_alive();
        debug!(len = data.len(), "binary frame is not UTF-8");
        let source = <serde_json::Error as serde::de::Error>::custom("frame is not valid UTF-8");
        reject(session, &RelayError::Malformed(source));
    }
}

fn reject(session: &Session, err: &RelayError) {
    let kind = err.error_kind();
    warn!(error = %err, kind, "frame rejected");
    counter!(MESSAGES_REJECTED_TOTAL, "kind" => kind).increment(1);
    let _ = session.send(&ServerMessage::error(err));
}
