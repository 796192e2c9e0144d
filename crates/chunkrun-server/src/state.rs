use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::game_loop::GameCommand;

/// Counters published by the game loop after every tick, read by `/health`.
#[derive(Debug, Default)]
pub struct WorldStats {
    pub players: AtomicUsize,
    pub chunks: AtomicU32,
    pub tick: AtomicU64,
}

impl WorldStats {
    pub fn players(&self) -> usize {
        self.players.load(Ordering::Relaxed)
    }

    pub fn chunks(&self) -> u32 {
        self.chunks.load(Ordering::Relaxed)
    }

    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub cmd_tx: mpsc::UnboundedSender<GameCommand>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub stats: Arc<WorldStats>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        cmd_tx: mpsc::UnboundedSender<GameCommand>,
        stats: Arc<WorldStats>,
    ) -> Self {
        Self {
            cmd_tx,
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            stats,
            config: Arc::new(config),
        }
    }
}

/// Counts an open WebSocket for as long as it is alive.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}
