//! # huddle
//!
//! WebRTC signaling relay binary: loads configuration, installs logging and
//! metrics, then serves until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_server::loader::{load_config, validate};
use huddle_server::metrics::install_recorder;
use huddle_server::shutdown::DEFAULT_DRAIN_TIMEOUT;
use huddle_server::{RelayServer, ServerConfig};
use huddle_telemetry::{LogFormat, init_telemetry};
use tracing::info;

/// WebRTC signaling relay.
#[derive(Parser, Debug)]
#[command(name = "huddle", version, about = "WebRTC signaling relay")]
struct Cli {
    /// JSON config file (defaults to `$HUDDLE_CONFIG` or `./huddle.json`).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long, short)]
    port: Option<u16>,

    /// Maximum concurrent WebSocket connections.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Default log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Seconds to wait for the server to drain on shutdown.
    #[arg(long, default_value_t = DEFAULT_DRAIN_TIMEOUT.as_secs())]
    shutdown_timeout: u64,
}

impl Cli {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max) = self.max_connections {
            config.max_connections = max;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
        if self.json_logs {
            config.logging.format = LogFormat::Json;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);
    validate(&config).context("invalid configuration")?;

    init_telemetry(&config.logging).context("failed to initialize logging")?;
    let metrics = install_recorder().context("failed to install metrics recorder")?;

    info!(
        host = %config.host,
        port = config.port,
        max_connections = config.max_connections,
        "starting huddle"
    );

    let server = RelayServer::new(config).with_metrics(metrics);
    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("failed to bind {}", server.config().bind_addr()))?;
    info!(%addr, "ready");

    server.shutdown().wait_for_signal().await;
    let drained = server
        .shutdown()
        .drain(handle, Duration::from_secs(cli.shutdown_timeout))
        .await;
    info!(drained, "huddle stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from([
            "huddle",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--max-connections",
            "4",
            "--log-level",
            "debug",
            "--json-logs",
        ]);
        let mut config = ServerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn no_flags_leave_config_untouched() {
        let cli = Cli::parse_from(["huddle"]);
        let mut config = ServerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, ServerConfig::default());
        assert_eq!(cli.shutdown_timeout, DEFAULT_DRAIN_TIMEOUT.as_secs());
    }
}
