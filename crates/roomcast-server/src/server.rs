//! `RoomcastServer`: Axum HTTP + WebSocket front end for a [`Hub`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use roomcast_hub::{Hub, HubError};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, RoomsResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Hub handle sockets are registered with.
    pub hub: Hub,
    /// When the server started.
    pub start_time: Instant,
    /// Largest inbound WebSocket message accepted.
    pub max_message_size: usize,
    /// Prometheus handle, if a recorder was installed.
    pub metrics: Option<PrometheusHandle>,
    /// Process-wide shutdown signal.
    pub shutdown: Arc<ShutdownCoordinator>,
}

/// The roomcast HTTP server.
pub struct RoomcastServer {
    config: ServerConfig,
    hub: Hub,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl RoomcastServer {
    /// Create a server in front of `hub`.
    ///
    /// `shutdown` stops the listener; spawn the hub with
    /// [`ShutdownCoordinator::child_token`] so the same signal stops it.
    pub fn new(
        config: ServerConfig,
        hub: Hub,
        shutdown: Arc<ShutdownCoordinator>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            config,
            hub,
            shutdown,
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            start_time: self.start_time,
            max_message_size: self.config.max_message_size,
            metrics: self.metrics.clone(),
            shutdown: Arc::clone(&self.shutdown),
        };

        Router::new()
            .route("/chating/{room_id}", get(handler::ws_handler))
            .route("/chating", get(handler::missing_room))
            .route("/chating/", get(handler::missing_room))
            .route("/health", get(health_handler))
            .route("/rooms", get(rooms_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve in a background task until shutdown is signalled.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%local_addr, "roomcast server listening");
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router).with_graceful_shutdown(token.cancelled_owned());
            if let Err(e) = serve.await {
                error!(error = %e, "server stopped with error");
            }
            info!("listener closed");
        });
        Ok((local_addr, handle))
    }

    /// Get the hub handle.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// GET /health
///
/// 503 once shutdown has begun, even while the hub is still draining.
async fn health_handler(State(state): State<AppState>) -> Response {
    let snapshot = if state.shutdown.is_shutting_down() {
        Err(HubError::Stopped)
    } else {
        state.hub.snapshot().await
    };
    match snapshot {
        Ok(snapshot) => Json(health::health_check(state.start_time, Some(&snapshot))).into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(health::health_check(state.start_time, None)),
        )
            .into_response(),
    }
}

/// GET /rooms
async fn rooms_handler(State(state): State<AppState>) -> Response {
    match state.hub.snapshot().await {
        Ok(snapshot) => Json(RoomsResponse::from(snapshot)).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
