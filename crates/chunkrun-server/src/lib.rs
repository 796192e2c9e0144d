pub mod config;
pub mod game_loop;
pub mod health;
pub mod state;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use chunkrun_sim::Simulation;

use config::ServerConfig;
use state::{AppState, WorldStats};

/// Build the Axum router and application state from a config. Spawns the game
/// loop, so this must run inside a tokio runtime.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();

    let sim = Simulation::new(config.simulation.clone());
    let stats = Arc::new(WorldStats::default());
    let (cmd_tx, _loop_handle) = game_loop::spawn_game_loop(sim, Arc::clone(&stats));
    let state = AppState::new(config, cmd_tx, stats);

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .fallback_service(ServeDir::new(&web_root))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}
