//! `RelayServer`: axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics::CONNECTIONS_REJECTED_TOTAL;
use crate::registry::SessionRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{SessionOptions, run_ws_session};

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The signaling relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a server with an empty registry.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the router: `/` and `/ws` upgrade, `/health`, `/metrics`.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in a background task until shutdown is triggered.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();
        info!(%addr, "signaling relay listening");

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(error) = result {
                error!(%error, "server stopped with error");
            }
        });
        Ok((addr, handle))
    }

    /// The session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET / and GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let connections = state.registry.connection_count();
    if connections >= state.config.max_connections {
        warn!(
            connections,
            max = state.config.max_connections,
            "connection limit reached, refusing upgrade"
        );
        counter!(CONNECTIONS_REJECTED_TOTAL).increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    let options = SessionOptions::from(state.config.as_ref());
    let token = state.shutdown.token();
    let registry = state.registry;
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, registry, options, token))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.connection_count(),
        state.registry.active_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}
