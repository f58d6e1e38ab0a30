//! # roomcastd
//!
//! Roomcast daemon: loads settings, starts the hub and the HTTP/WebSocket
//! server, and runs until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use roomcast_hub::{Hub, HubConfig};
use roomcast_server::{RoomcastServer, ServerConfig, ShutdownCoordinator};
use roomcast_settings::{HubSettings, LogLevel, RoomcastSettings, ServerSettings};

/// Roomcast hub daemon.
#[derive(Parser, Debug)]
#[command(name = "roomcastd", about = "Room-scoped WebSocket broadcast hub")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.roomcast/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (overrides settings; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<LogLevel>,
}

impl Cli {
    /// Layer CLI flags over loaded settings.
    fn apply(&self, settings: &mut RoomcastSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
    }
}

fn load(cli: &Cli) -> Result<RoomcastSettings> {
    let mut settings = match &cli.config {
        Some(path) => roomcast_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => roomcast_settings::load_settings().context("Failed to load settings")?,
    };
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn server_config(settings: &ServerSettings) -> ServerConfig {
    ServerConfig {
        host: settings.host.clone(),
        port: settings.port,
        max_message_size: settings.max_message_size,
        ..ServerConfig::default()
    }
}

fn hub_config(settings: &HubSettings) -> HubConfig {
    HubConfig {
        outbound_queue_capacity: settings.outbound_queue_capacity,
        keepalive_interval: Duration::from_millis(settings.keepalive_interval_ms),
        command_buffer: settings.command_buffer,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;

    roomcast_logging::init_subscriber(
        settings.logging.level.as_filter_str(),
        settings.logging.format,
    );

    let metrics = match roomcast_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    let config = server_config(&settings.server);
    let shutdown_timeout = config.shutdown_timeout;
    let shutdown = Arc::new(ShutdownCoordinator::new());
    let (hub, hub_task) = Hub::spawn(hub_config(&settings.hub), shutdown.child_token());
    let server = RoomcastServer::new(config, hub, Arc::clone(&shutdown), metrics);

    let (addr, server_task) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!(
        queue_capacity = settings.hub.outbound_queue_capacity,
        keepalive_ms = settings.hub.keepalive_interval_ms,
        "roomcast listening on ws://{addr}/chating/{{roomId}}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let clean = shutdown
        .graceful_shutdown(vec![server_task, hub_task], Some(shutdown_timeout))
        .await;
    if !clean {
        tracing::warn!("forced shutdown");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
