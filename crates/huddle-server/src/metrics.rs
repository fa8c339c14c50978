//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Returns the handle used to render `/metrics`. Call once at startup,
/// before any metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Connections accepted (counter).
pub const CONNECTIONS_TOTAL: &str = "huddle_connections_total";
/// Connections closed (counter, labels: reason).
pub const DISCONNECTIONS_TOTAL: &str = "huddle_disconnections_total";
/// Upgrades refused at the connection limit (counter).
pub const CONNECTIONS_REJECTED_TOTAL: &str = "huddle_connections_rejected_total";
/// Open connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "huddle_connections_active";
/// Sessions that have joined the peer stream (gauge).
pub const PEERS_ACTIVE: &str = "huddle_peers_active";
/// Inbound frames (counter, labels: type).
pub const MESSAGES_RECEIVED_TOTAL: &str = "huddle_messages_received_total";
/// Peer-exchange messages delivered to a target queue (counter, labels: type).
pub const MESSAGES_FORWARDED_TOTAL: &str = "huddle_messages_forwarded_total";
/// Frames answered with an error (counter, labels: kind).
pub const MESSAGES_REJECTED_TOTAL: &str = "huddle_messages_rejected_total";
/// Broadcast frames a recipient queue refused (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "huddle_broadcast_drops_total";
/// Connection lifetime in seconds (histogram).
pub const CONNECTION_DURATION_SECONDS: &str = "huddle_connection_duration_seconds";
