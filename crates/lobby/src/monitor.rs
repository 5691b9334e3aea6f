//! Read-only HTTP monitoring endpoints.
//!
//! Every handler reads a presence snapshot from the lobby; nothing here can
//! change session state.

use axum::{extract::State, routing::get, Json, Router};
use lobby_core::{Lobby, PresenceEntry};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tracing::info;

/// Builds the monitoring router.
pub fn router(lobby: Arc<Lobby>) -> Router {
    Router::new()
        .route("/api/players/count", get(player_count_handler))
        .route("/api/players", get(players_handler))
        .route("/api/status", get(status_handler))
        // Legacy paths kept for older dashboards
        .route("/status", get(legacy_status_handler))
        .route("/players", get(players_handler))
        .with_state(lobby)
}

/// Serves the monitoring endpoints until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, lobby: Arc<Lobby>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("📈 Monitoring endpoints listening on {}", listener.local_addr()?);
    axum::serve(listener, router(lobby))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn player_count_handler(State(lobby): State<Arc<Lobby>>) -> Json<Value> {
    Json(json!({ "count": lobby.registry().len() }))
}

async fn players_handler(State(lobby): State<Arc<Lobby>>) -> Json<Vec<PresenceEntry>> {
    Json(lobby.presence().sessions)
}

async fn status_handler(State(lobby): State<Arc<Lobby>>) -> Json<Value> {
    Json(json!({
        "status": "online",
        "players": lobby.registry().len(),
    }))
}

async fn legacy_status_handler(State(lobby): State<Arc<Lobby>>) -> Json<Value> {
    let server_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default();

    Json(json!({
        "onlinePlayers": lobby.registry().len(),
        "serverTime": server_time,
        "status": "running",
    }))
}
