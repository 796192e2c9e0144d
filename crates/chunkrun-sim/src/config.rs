use serde::{Deserialize, Serialize};

/// Simulation rate.
pub const TICK_RATE_HZ: f32 = 60.0;
/// Highest accepted simulation rate.
pub const MAX_TICK_RATE_HZ: f32 = 1000.0;
/// Downward acceleration per tick.
pub const GRAVITY: f32 = 0.5;
/// Horizontal velocity multiplier applied after each displacement.
pub const FRICTION: f32 = 0.85;
/// Velocity change per left/right intent.
pub const MOVE_ACCEL: f32 = 1.0;
/// Horizontal speed clamp (both directions).
pub const MAX_SPEED: f32 = 8.0;
/// Upward speed of a jump.
pub const JUMP_VELOCITY: f32 = 15.0;
/// Player box edge length.
pub const PLAYER_SIZE: f32 = 30.0;
/// Width of one world chunk.
pub const CHUNK_SIZE: f32 = 800.0;
/// y coordinate of the ground surface.
pub const GROUND_LEVEL: f32 = 500.0;
/// Chunks generated before the first player joins.
pub const INITIAL_CHUNKS: u32 = 20;

/// Player physics parameters. Units are world units and ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub friction: f32,
    pub move_accel: f32,
    pub max_speed: f32,
    pub jump_velocity: f32,
    pub player_size: f32,
    /// Distance from the ground that still counts as standing on it.
    pub ground_tolerance: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            friction: FRICTION,
            move_accel: MOVE_ACCEL,
            max_speed: MAX_SPEED,
            jump_velocity: JUMP_VELOCITY,
            player_size: PLAYER_SIZE,
            ground_tolerance: 1.0,
        }
    }
}

/// World layout and generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub chunk_size: f32,
    pub ground_level: f32,
    pub initial_chunks: u32,
    /// Fixed RNG seed for chunk generation. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            ground_level: GROUND_LEVEL,
            initial_chunks: INITIAL_CHUNKS,
            seed: None,
        }
    }
}

/// Damage, scoring and respawn parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub max_health: u32,
    pub hit_invulnerability_ms: u64,
    pub respawn_invulnerability_ms: u64,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub coin_value: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_health: 100,
            hit_invulnerability_ms: 1000,
            respawn_invulnerability_ms: 2000,
            spawn_x: 100.0,
            spawn_y: 400.0,
            coin_value: 10,
        }
    }
}

/// Top-level simulation configuration, embedded in the server's config file
/// under `[simulation]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub tick_rate_hz: f32,
    pub physics: PhysicsConfig,
    pub world: WorldConfig,
    pub combat: CombatConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: TICK_RATE_HZ,
            physics: PhysicsConfig::default(),
            world: WorldConfig::default(),
            combat: CombatConfig::default(),
        }
    }
}

impl SimConfig {
    /// Returns a description of the first invalid value, if any.
    pub fn check(&self) -> Option<String> {
        if !(self.tick_rate_hz > 0.0 && self.tick_rate_hz <= MAX_TICK_RATE_HZ) {
            return Some(format!(
                "tick_rate_hz must be in (0, {MAX_TICK_RATE_HZ}], got {}",
                self.tick_rate_hz
            ));
        }
        if !(self.world.chunk_size.is_finite() && self.world.chunk_size > 0.0) {
            return Some(format!(
                "world.chunk_size must be > 0, got {}",
                self.world.chunk_size
            ));
        }
        if self.physics.max_speed.is_nan() || self.physics.max_speed < 0.0 {
            return Some("physics.max_speed must be >= 0".to_string());
        }
        if self.combat.max_health == 0 {
            return Some("combat.max_health must be > 0".to_string());
        }
        None
    }
}
