//! Server execution logic.

use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use super::{
    auth::header_identity,
    handler::{get_rooms, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Build the application router.
///
/// `/api/health` is public; the chat routes sit behind the identity
/// middleware. Tests reuse this to serve on an ephemeral port.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/ws/chat/{room_id}", get(websocket_handler))
        .route("/api/rooms", get(get_rooms))
        .route_layer(middleware::from_fn(header_identity));

    Router::new()
        .route("/api/health", get(health_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the chat relay server until interrupted.
///
/// # Arguments
///
/// * `host` - The host address to bind to (e.g., "127.0.0.1")
/// * `port` - The port number to bind to (e.g., 8080)
pub async fn run_server(
    host: String,
    port: u16,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error>> {
    state.session_config.validate()?;

    let app = router(state.clone());
    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("chat relay listening on {}", listener.local_addr()?);
    tracing::info!("connect to: ws://{}/ws/chat/{{room_id}}", bind_addr);
    tracing::info!("press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the hub loop; live sessions are not force-closed and will
    // terminate through their own connection error paths.
    let _ = state.hub.shutdown().await;
    tracing::info!("server shutdown complete");

    Ok(())
}
