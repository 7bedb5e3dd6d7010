//! WebSocket connection handler and HTTP endpoints.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
};
use tokio::sync::mpsc;

use crate::domain::{Identity, RoomId, RoomInfo};
use crate::session::{Session, run_session};

use super::state::AppState;

/// Upgrade an authorized connection and hand it to a new session.
///
/// Authorization happens before the upgrade: a user who is not a member of
/// the room never gets a socket. Registration with the hub also happens here,
/// so by the time the session tasks start their outbound queue is live.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, StatusCode> {
    let room_id = RoomId::new(room_id).map_err(|e| {
        tracing::warn!(error = %e, "rejecting upgrade with invalid room id");
        StatusCode::BAD_REQUEST
    })?;

    match state.store.is_member(&room_id, &identity.user_id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(%room_id, user_id = %identity.user_id, "rejecting non-member");
            return Err(StatusCode::FORBIDDEN);
        }
        Err(e) => {
            tracing::error!(%room_id, error = %e, "membership lookup failed");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    let config = state.session_config;
    let session = Session::new(room_id.clone(), identity);
    let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);

    if state
        .hub
        .register(room_id, session.id, queue_tx)
        .await
        .is_err()
    {
        tracing::error!(session_id = %session.id, "hub unavailable, rejecting upgrade");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    tracing::info!(
        session_id = %session.id,
        room_id = %session.room_id,
        user = %session.identity.user_name,
        "session registered"
    );

    let hub = state.hub.clone();
    let store = state.store.clone();
    Ok(ws
        .max_message_size(config.max_frame_bytes)
        .on_upgrade(move |socket| run_session(socket, session, hub, store, config, queue_rx)))
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Rooms the authenticated user belongs to.
pub async fn get_rooms(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<RoomInfo>>, StatusCode> {
    state
        .store
        .list_rooms_for_user(&identity.user_id)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(user_id = %identity.user_id, error = %e, "room listing failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
