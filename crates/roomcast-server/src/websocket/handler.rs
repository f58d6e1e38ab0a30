//! `GET /chating/{room_id}`: validate the room, upgrade, hand off to the hub.

use axum::Json;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use roomcast_hub::RoomId;
use serde_json::json;
use tracing::{debug, warn};

use crate::metrics::{WS_UPGRADE_REJECTIONS_TOTAL, WS_UPGRADES_TOTAL};
use crate::server::AppState;
use crate::websocket::adapter;

/// Upgrade to a WebSocket and register the socket in `room_id`.
pub(crate) async fn ws_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if room_id.trim().is_empty() {
        return missing_room().await;
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            counter!(WS_UPGRADE_REJECTIONS_TOTAL, "reason" => "not_websocket").increment(1);
            debug!(room = %room_id, error = %rejection, "upgrade refused");
            return rejection.into_response();
        }
    };

    let hub = state.hub.clone();
    let room = RoomId::from(room_id);
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| async move {
            let connection = adapter::into_connection(socket);
            let id = connection.id();
            if hub.register(room.clone(), connection).await.is_err() {
                warn!(connection_id = %id, %room, "hub stopped, dropping upgraded socket");
                return;
            }
            counter!(WS_UPGRADES_TOTAL).increment(1);
        })
}

/// `/chating` without a room.
pub(crate) async fn missing_room() -> Response {
    counter!(WS_UPGRADE_REJECTIONS_TOTAL, "reason" => "missing_room").increment(1);
    warn!("roomId is required");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "roomId is required" })),
    )
        .into_response()
}
