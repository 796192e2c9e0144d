use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: usize,
    pub world: WorldInfo,
}

#[derive(Serialize)]
pub struct WorldInfo {
    pub players: usize,
    pub chunks: u32,
    pub tick: u64,
}

/// Server status, open WebSocket count and world size as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: state.ws_connection_count.load(Ordering::Relaxed),
        world: WorldInfo {
            players: state.stats.players(),
            chunks: state.stats.chunks(),
            tick: state.stats.tick(),
        },
    })
}

/// Ready once the game loop is accepting commands.
pub async fn readiness_check(State(state): State<AppState>) -> &'static str {
    if state.cmd_tx.is_closed() {
        return "not ready: game loop stopped";
    }
    "ready"
}
