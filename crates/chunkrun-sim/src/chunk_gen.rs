use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::WorldConfig;
use crate::geometry::Rect;

/// Stable entity identifier: the owning chunk and the entity's sequence
/// number inside that chunk. Each entity category has its own id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub chunk: u32,
    pub index: u32,
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.chunk, self.index)
    }
}

/// Platform size classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformSize {
    Standard,
    Wide,
    Narrow,
}

impl PlatformSize {
    pub const ALL: [PlatformSize; 3] = [Self::Standard, Self::Wide, Self::Narrow];

    /// (width, height)
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            Self::Standard => (100.0, 20.0),
            Self::Wide => (150.0, 20.0),
            Self::Narrow => (80.0, 20.0),
        }
    }
}

/// Obstacle behavior. `Moving` carries its signed horizontal speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ObstacleKind {
    Spike,
    Moving { speed: f32 },
    Hole,
    Wall,
}

impl ObstacleKind {
    /// (width, height)
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            Self::Spike => (40.0, 40.0),
            Self::Moving { .. } => (60.0, 20.0),
            Self::Hole => (80.0, 200.0),
            Self::Wall => (30.0, 120.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: EntityId,
    pub rect: Rect,
    pub size: PlatformSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: EntityId,
    pub rect: Rect,
    pub kind: ObstacleKind,
    /// Chunk the obstacle was generated in. Moving obstacles patrol its span.
    pub chunk: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub id: EntityId,
    pub rect: Rect,
    pub collected: bool,
}

/// One generated world segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: u32,
    pub platforms: Vec<Platform>,
    pub obstacles: Vec<Obstacle>,
    pub coins: Vec<Coin>,
}

/// How many entities of each category a chunk receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCounts {
    pub platforms: u32,
    pub obstacles: u32,
    pub coins: u32,
}

/// Coin box edge length.
pub const COIN_SIZE: f32 = 20.0;
/// Top edge of every hole.
const HOLE_Y: f32 = 400.0;

/// Random chunk content. Owns its RNG so the world can be reproduced from a
/// seed when one is configured.
pub struct ChunkGenerator {
    rng: StdRng,
    chunk_size: f32,
}

impl ChunkGenerator {
    pub fn new(config: &WorldConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            chunk_size: config.chunk_size,
        }
    }

    pub fn with_seed(seed: u64, chunk_size: f32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            chunk_size,
        }
    }

    pub fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    /// Generate the chunk with the given index.
    pub fn generate(&mut self, index: u32) -> Chunk {
        let counts = self.roll_counts();
        self.populate_chunk(index, counts)
    }

    pub fn roll_counts(&mut self) -> ChunkCounts {
        ChunkCounts {
            platforms: self.rng.random_range(4..=11),
            obstacles: self.rng.random_range(2..=7),
            coins: self.rng.random_range(5..=14),
        }
    }

    /// Place exactly `counts` entities inside chunk `index`.
    pub fn populate_chunk(&mut self, index: u32, counts: ChunkCounts) -> Chunk {
        let origin = index as f32 * self.chunk_size;

        let platforms = (0..counts.platforms)
            .map(|i| {
                let size = PlatformSize::ALL[self.rng.random_range(0..PlatformSize::ALL.len())];
                let (w, h) = size.dimensions();
                let x = self.random_x(origin);
                let y: f32 = self.rng.random_range(200.0..500.0);
                Platform {
                    id: EntityId { chunk: index, index: i },
                    rect: Rect::new(x, y, w, h),
                    size,
                }
            })
            .collect();

        let obstacles = (0..counts.obstacles)
            .map(|i| {
                let kind = self.random_obstacle_kind();
                let (w, h) = kind.dimensions();
                let x = self.random_x(origin);
                // Movers start inside the span they patrol.
                let x = match kind {
                    ObstacleKind::Moving { .. } => x.min(origin + self.chunk_size - w),
                    _ => x,
                };
                let y = match kind {
                    ObstacleKind::Hole => HOLE_Y,
                    _ => self.rng.random_range(300.0..400.0),
                };
                Obstacle {
                    id: EntityId { chunk: index, index: i },
                    rect: Rect::new(x, y, w, h),
                    kind,
                    chunk: index,
                }
            })
            .collect();

        let coins = (0..counts.coins)
            .map(|i| Coin {
                id: EntityId { chunk: index, index: i },
                rect: Rect::new(
                    self.random_x(origin),
                    self.rng.random_range(150.0..400.0),
                    COIN_SIZE,
                    COIN_SIZE,
                ),
                collected: false,
            })
            .collect();

        Chunk {
            index,
            platforms,
            obstacles,
            coins,
        }
    }

    fn random_x(&mut self, origin: f32) -> f32 {
        // f32 rounding can land exactly on the next chunk's origin.
        let x = origin + self.rng.random_range(0.0..self.chunk_size);
        if x >= origin + self.chunk_size {
            origin
        } else {
            x
        }
    }

    fn random_obstacle_kind(&mut self) -> ObstacleKind {
        match self.rng.random_range(0u8..4) {
            0 => ObstacleKind::Spike,
            1 => {
                let magnitude: f32 = self.rng.random_range(1.0..3.0);
                let speed = if self.rng.random_bool(0.5) {
                    magnitude
                } else {
                    -magnitude
                };
                ObstacleKind::Moving { speed }
            },
            2 => ObstacleKind::Hole,
            _ => ObstacleKind::Wall,
        }
    }
}
