use serde::{Deserialize, Serialize};

use chunkrun_core::PlayerId;
use chunkrun_core::player::PlayerColor;

use crate::SimEvent;
use crate::chunk_gen::{Coin, Obstacle, ObstacleKind, Platform};
use crate::clock::Millis;
use crate::collision::{self, CollisionOutcome, Correction};
use crate::config::{CombatConfig, PhysicsConfig, SimConfig};
use crate::geometry::{Rect, Vec2};
use crate::world::WorldState;

/// Name given to players who join without one.
pub const DEFAULT_NAME: &str = "Anonymous";

/// Damage state, derived from `invulnerable_until` and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageState {
    Normal,
    Invulnerable { until: Millis },
}

/// Effect of touching a hazard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Knockback {
    pub damage: u32,
    /// New horizontal velocity, or `None` to keep the current one.
    pub vx: Option<f32>,
    pub vy: f32,
}

impl Knockback {
    /// Effect of an obstacle kind. Walls are solid, not hazards, and return `None`.
    pub fn for_kind(kind: &ObstacleKind) -> Option<Self> {
        match *kind {
            ObstacleKind::Spike => Some(Self {
                damage: 2,
                vx: Some(-5.0),
                vy: -8.0,
            }),
            // Thrown opposite to the obstacle's travel direction.
            ObstacleKind::Moving { speed } => Some(Self {
                damage: 1,
                vx: Some(-5.0 * speed.signum()),
                vy: -5.0,
            }),
            ObstacleKind::Hole => Some(Self {
                damage: 5,
                vx: None,
                vy: 2.0,
            }),
            ObstacleKind::Wall => None,
        }
    }
}

/// One connected player: kinematics, health, score and hit window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub width: f32,
    pub height: f32,
    pub grounded: bool,
    pub health: u32,
    pub score: u32,
    pub invulnerable_until: Option<Millis>,
}

impl Player {
    pub fn new(id: PlayerId, name: &str, config: &SimConfig) -> Self {
        let name = name.trim();
        Self {
            id,
            name: if name.is_empty() {
                DEFAULT_NAME.to_string()
            } else {
                name.to_string()
            },
            color: PlayerColor::for_player(id),
            x: config.combat.spawn_x,
            y: config.combat.spawn_y,
            vx: 0.0,
            vy: 0.0,
            width: config.physics.player_size,
            height: config.physics.player_size,
            grounded: false,
            health: config.combat.max_health,
            score: 0,
            invulnerable_until: None,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn damage_state(&self, now: Millis) -> DamageState {
        match self.invulnerable_until {
            Some(until) if now < until => DamageState::Invulnerable { until },
            _ => DamageState::Normal,
        }
    }

    pub fn is_invulnerable(&self, now: Millis) -> bool {
        matches!(self.damage_state(now), DamageState::Invulnerable { .. })
    }

    /// Only works while standing on something.
    pub fn jump(&mut self, physics: &PhysicsConfig) {
        if self.grounded {
            self.vy = -physics.jump_velocity;
            self.grounded = false;
        }
    }

    /// One intent's worth of acceleration to the left, then clamp.
    pub fn move_left(&mut self, physics: &PhysicsConfig) {
        self.vx = (self.vx - physics.move_accel).clamp(-physics.max_speed, physics.max_speed);
    }

    /// One intent's worth of acceleration to the right, then clamp.
    pub fn move_right(&mut self, physics: &PhysicsConfig) {
        self.vx = (self.vx + physics.move_accel).clamp(-physics.max_speed, physics.max_speed);
    }

    /// Back to the spawn point with full health and a long grace window.
    pub fn respawn(&mut self, now: Millis, combat: &CombatConfig) {
        self.x = combat.spawn_x;
        self.y = combat.spawn_y;
        self.vx = 0.0;
        self.vy = 0.0;
        self.grounded = false;
        self.health = combat.max_health;
        self.invulnerable_until = Some(now + combat.respawn_invulnerability_ms);
    }

    /// Advance one tick. The step order is observable and must not change:
    ///
    /// 1. remember the previous box
    /// 2. gravity, displacement, then friction
    /// 3. clamp to the ground
    /// 4. grounded = within tolerance of the ground
    /// 5. platforms (last directional contact wins)
    /// 6. obstacles (first applicable one wins)
    /// 7. coins (all overlapping)
    ///
    /// World growth runs right after, driven by the simulation, because it
    /// needs every player's position.
    pub fn update(&mut self, world: &mut WorldState, now: Millis, config: &SimConfig) -> Vec<SimEvent> {
        let physics = &config.physics;
        let mut events = Vec::new();

        let prev = self.rect();

        self.vy += physics.gravity;
        self.x += self.vx;
        self.y += self.vy;
        self.vx *= physics.friction;

        let ground = world.ground_level();
        if self.y + self.height > ground {
            self.y = ground - self.height;
            self.vy = 0.0;
        }

        self.grounded = (ground - (self.y + self.height)).abs() <= physics.ground_tolerance;

        self.resolve_platforms(&prev, world.platforms());
        self.resolve_obstacles(world.obstacles(), now, &config.combat, &mut events);
        self.collect_coins(world.coins_mut(), config.combat.coin_value, &mut events);

        events
    }

    fn apply(&mut self, correction: &Correction) {
        self.x = correction.position.x;
        self.y = correction.position.y;
        self.vx = correction.velocity.x;
        self.vy = correction.velocity.y;
        if correction.grounded {
            self.grounded = true;
        }
    }

    fn resolve_platforms(&mut self, prev: &Rect, platforms: &[Platform]) {
        let curr = self.rect();
        let velocity = Vec2::new(self.vx, self.vy);

        let last = platforms
            .iter()
            .rev()
            .find_map(|p| match collision::resolve(prev, &curr, velocity, &p.rect) {
                CollisionOutcome::Contact {
                    side: Some(_),
                    correction,
                } => Some(correction),
                _ => None,
            });

        if let Some(correction) = last {
            self.apply(&correction);
        }
    }

    fn resolve_obstacles(
        &mut self,
        obstacles: &[Obstacle],
        now: Millis,
        combat: &CombatConfig,
        events: &mut Vec<SimEvent>,
    ) {
        let invulnerable = self.is_invulnerable(now);

        for obstacle in obstacles {
            let curr = self.rect();
            if !curr.overlaps(&obstacle.rect) {
                continue;
            }

            match Knockback::for_kind(&obstacle.kind) {
                Some(_) if invulnerable => continue,
                Some(hit) => self.take_hit(obstacle.kind, hit, now, combat, events),
                None => {
                    let velocity = Vec2::new(self.vx, self.vy);
                    let correction = collision::push_out_horizontally(&curr, velocity, &obstacle.rect);
                    self.apply(&correction);
                },
            }
            break;
        }
    }

    fn take_hit(
        &mut self,
        kind: ObstacleKind,
        hit: Knockback,
        now: Millis,
        combat: &CombatConfig,
        events: &mut Vec<SimEvent>,
    ) {
        self.health = self.health.saturating_sub(hit.damage);
        if let Some(vx) = hit.vx {
            self.vx = vx;
        }
        self.vy = hit.vy;
        events.push(SimEvent::HazardHit {
            player_id: self.id,
            kind,
            damage: hit.damage,
            health: self.health,
        });

        if self.health == 0 {
            self.respawn(now, combat);
            tracing::debug!(player_id = self.id, "Player respawned");
            events.push(SimEvent::Respawned { player_id: self.id });
        } else {
            self.invulnerable_until = Some(now + combat.hit_invulnerability_ms);
        }
    }

    fn collect_coins(&mut self, coins: &mut [Coin], value: u32, events: &mut Vec<SimEvent>) {
        let rect = self.rect();
        for coin in coins
            .iter_mut()
            .filter(|c| !c.collected && c.rect.overlaps(&rect))
        {
            coin.collected = true;
            self.score = self.score.saturating_add(value);
            events.push(SimEvent::CoinCollected {
                player_id: self.id,
                coin: coin.id,
                score: self.score,
            });
        }
    }
}
