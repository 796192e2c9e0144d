pub mod chunk_gen;
pub mod clock;
pub mod collision;
pub mod config;
pub mod geometry;
pub mod player;
pub mod simulation;
pub mod world;

use serde::{Deserialize, Serialize};

use chunkrun_core::PlayerId;

use chunk_gen::{EntityId, ObstacleKind};

pub use clock::{Clock, ManualClock, Millis, MonotonicClock};
pub use config::SimConfig;
pub use simulation::{Direction, Simulation, Snapshot, TickReport, Welcome};

/// Something that happened during a tick. Used for logging and tests; clients
/// learn about state changes from snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    CoinCollected {
        player_id: PlayerId,
        coin: EntityId,
        score: u32,
    },
    HazardHit {
        player_id: PlayerId,
        kind: ObstacleKind,
        damage: u32,
        health: u32,
    },
    Respawned {
        player_id: PlayerId,
    },
    WorldGrew {
        chunk: u32,
    },
}
