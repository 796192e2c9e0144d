use crate::chunk_gen::{Chunk, ChunkGenerator, Coin, Obstacle, ObstacleKind, Platform};
use crate::config::WorldConfig;

/// Every generated entity, flattened across chunks in generation order.
///
/// Chunks `0..chunk_count` are generated; nothing past the frontier exists.
/// Platforms and obstacles are never removed. Coins stay in the list after
/// collection with their flag set.
pub struct WorldState {
    chunk_size: f32,
    ground_level: f32,
    generator: ChunkGenerator,
    chunk_count: u32,
    platforms: Vec<Platform>,
    obstacles: Vec<Obstacle>,
    coins: Vec<Coin>,
}

impl WorldState {
    /// Empty world. Call [`seed_initial_chunks`](Self::seed_initial_chunks)
    /// before the first player joins.
    pub fn new(config: &WorldConfig) -> Self {
        Self::with_generator(config, ChunkGenerator::new(config))
    }

    pub fn with_generator(config: &WorldConfig, generator: ChunkGenerator) -> Self {
        Self {
            chunk_size: config.chunk_size,
            ground_level: config.ground_level,
            generator,
            chunk_count: 0,
            platforms: Vec::new(),
            obstacles: Vec::new(),
            coins: Vec::new(),
        }
    }

    pub fn seed_initial_chunks(&mut self, count: u32) -> Vec<Chunk> {
        self.ensure_generated_up_to(i64::from(count) - 1)
    }

    pub fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    pub fn ground_level(&self) -> f32 {
        self.ground_level
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    /// Highest generated chunk index, `None` while the world is empty.
    pub fn frontier(&self) -> Option<u32> {
        self.chunk_count.checked_sub(1)
    }

    /// Chunk index containing world x coordinate `x`. Negative for x < 0.
    pub fn chunk_of(&self, x: f32) -> i64 {
        (x / self.chunk_size).floor() as i64
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    pub fn coins_mut(&mut self) -> &mut [Coin] {
        &mut self.coins
    }

    /// Generate every missing chunk up to and including `index`, in order.
    /// Returns the new chunks; already generated indices are never redone.
    pub fn ensure_generated_up_to(&mut self, index: i64) -> Vec<Chunk> {
        let target = index.min(i64::from(u32::MAX - 1));
        let mut grown = Vec::new();
        while i64::from(self.chunk_count) <= target {
            grown.push(self.generate_next());
        }
        grown
    }

    /// Growth check run after each player update.
    ///
    /// When the furthest player's chunk index exceeds a tenth of the platform
    /// count, one chunk is appended past the frontier. Independently of that
    /// heuristic, the world is always extended to cover the furthest player.
    pub fn grow_for_players<I>(&mut self, xs: I) -> Vec<Chunk>
    where
        I: IntoIterator<Item = f32>,
    {
        let Some(max_x) = xs.into_iter().filter(|x| x.is_finite()).reduce(f32::max) else {
            return Vec::new();
        };
        let max_chunk = self.chunk_of(max_x);

        let mut grown = Vec::new();
        if max_chunk as f64 > self.platforms.len() as f64 / 10.0 {
            grown.push(self.generate_next());
        }
        grown.extend(self.ensure_generated_up_to(max_chunk));
        grown
    }

    /// Move every moving obstacle by its speed, bouncing between the edges of
    /// the chunk it was generated in.
    pub fn advance_moving_obstacles(&mut self) {
        let chunk_size = self.chunk_size;
        for obstacle in &mut self.obstacles {
            let ObstacleKind::Moving { speed } = &mut obstacle.kind else {
                continue;
            };
            let start = obstacle.chunk as f32 * chunk_size;
            let end = start + chunk_size - obstacle.rect.width;

            obstacle.rect.x += *speed;
            if obstacle.rect.x <= start {
                obstacle.rect.x = start;
                *speed = speed.abs();
            } else if obstacle.rect.x >= end {
                obstacle.rect.x = end;
                *speed = -speed.abs();
            }
        }
    }

    fn generate_next(&mut self) -> Chunk {
        let index = self.chunk_count;
        let chunk = self.generator.generate(index);
        self.platforms.extend(chunk.platforms.iter().cloned());
        self.obstacles.extend(chunk.obstacles.iter().cloned());
        self.coins.extend(chunk.coins.iter().cloned());
        self.chunk_count += 1;
        tracing::debug!(
            chunk = index,
            platforms = chunk.platforms.len(),
            obstacles = chunk.obstacles.len(),
            coins = chunk.coins.len(),
            "Generated chunk"
        );
        chunk
    }

    /// Pretend chunks `0..count` exist without placing anything in them.
    #[cfg(test)]
    pub(crate) fn mark_generated(&mut self, count: u32) {
        self.chunk_count = self.chunk_count.max(count);
    }

    #[cfg(test)]
    pub(crate) fn insert_platform(&mut self, platform: Platform) {
        self.platforms.push(platform);
    }

    #[cfg(test)]
    pub(crate) fn insert_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    #[cfg(test)]
    pub(crate) fn insert_coin(&mut self, coin: Coin) {
        self.coins.push(coin);
    }
}
