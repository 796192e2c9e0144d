use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use chunkrun_core::PlayerId;

use crate::SimEvent;
use crate::chunk_gen::{Chunk, Coin, Obstacle, Platform};
use crate::clock::{Clock, MonotonicClock};
use crate::config::SimConfig;
use crate::player::Player;
use crate::world::WorldState;

/// Movement intent sent by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
    Jump,
}

impl Direction {
    /// Parse the wire spelling. Anything unrecognized is `None`.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "jump" => Some(Self::Jump),
            _ => None,
        }
    }
}

/// Broadcast once per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub players: HashMap<PlayerId, Player>,
    pub obstacles: Vec<Obstacle>,
    pub coins: Vec<Coin>,
}

/// Everything a joining client needs to render the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Welcome {
    pub you: PlayerId,
    pub tick: u64,
    pub players: HashMap<PlayerId, Player>,
    pub platforms: Vec<Platform>,
    pub obstacles: Vec<Obstacle>,
    pub coins: Vec<Coin>,
}

/// Result of one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    pub tick: u64,
    pub events: Vec<SimEvent>,
    /// Chunks generated since the previous report, in index order.
    pub grown: Vec<Chunk>,
}

/// The authoritative world: players, generated chunks and the tick counter.
///
/// Single owner; the server's game loop holds it exclusively and applies
/// intents between ticks.
pub struct Simulation {
    config: SimConfig,
    clock: Box<dyn Clock>,
    world: WorldState,
    players: HashMap<PlayerId, Player>,
    /// Update order. Players are updated in the order they joined.
    player_ids: Vec<PlayerId>,
    next_player_id: PlayerId,
    tick: u64,
    /// Chunks generated outside a tick, reported with the next one.
    pending_growth: Vec<Chunk>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self::with_clock(config, Box::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: SimConfig, clock: Box<dyn Clock>) -> Self {
        let world = WorldState::new(&config.world);
        Self::with_world(config, clock, world)
    }

    /// Use a prepared world. Initial chunks are generated if still missing.
    pub fn with_world(config: SimConfig, clock: Box<dyn Clock>, mut world: WorldState) -> Self {
        let initial = world.seed_initial_chunks(config.world.initial_chunks);
        tracing::info!(
            chunks = world.chunk_count(),
            generated = initial.len(),
            platforms = world.platforms().len(),
            "World initialized"
        );
        Self {
            config,
            clock,
            world,
            players: HashMap::new(),
            player_ids: Vec::new(),
            next_player_id: 1,
            tick: 0,
            pending_growth: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn player_count(&self) -> usize {
        self.player_ids.len()
    }

    /// Player ids in update order.
    pub fn player_ids(&self) -> &[PlayerId] {
        &self.player_ids
    }

    /// Add a player at the spawn point. Blank names become "Anonymous".
    pub fn join(&mut self, name: &str) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;

        let player = Player::new(id, name, &self.config);
        let spawn_chunk = self.world.chunk_of(player.x);
        tracing::info!(
            player_id = id,
            name = %player.name,
            color = %player.color.to_hex(),
            "Player joined"
        );
        self.players.insert(id, player);
        self.player_ids.push(id);

        let grown = self.world.ensure_generated_up_to(spawn_chunk);
        self.pending_growth.extend(grown);
        id
    }

    /// Apply one intent immediately. Returns false for unknown ids.
    pub fn apply_move(&mut self, id: PlayerId, direction: Direction) -> bool {
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        let physics = &self.config.physics;
        match direction {
            Direction::Left => player.move_left(physics),
            Direction::Right => player.move_right(physics),
            Direction::Jump => player.jump(physics),
        }
        true
    }

    /// Remove a player. Returns false if the id was not present.
    pub fn disconnect(&mut self, id: PlayerId) -> bool {
        if self.players.remove(&id).is_none() {
            return false;
        }
        self.player_ids.retain(|&pid| pid != id);
        tracing::info!(player_id = id, "Player left");
        true
    }

    /// Advance the world by one tick.
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now_ms();
        self.tick += 1;

        let mut events = Vec::new();
        let mut grown = std::mem::take(&mut self.pending_growth);

        for &id in &self.player_ids {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            events.extend(player.update(&mut self.world, now, &self.config));

            let xs = self.players.values().map(|p| p.x);
            grown.extend(self.world.grow_for_players(xs));
        }

        self.world.advance_moving_obstacles();

        for chunk in &grown {
            events.push(SimEvent::WorldGrew { chunk: chunk.index });
        }

        TickReport {
            tick: self.tick,
            events,
            grown,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            players: self.players.clone(),
            obstacles: self.world.obstacles().to_vec(),
            coins: self.world.coins().to_vec(),
        }
    }

    /// Full world plus every player, for the client that just joined as `id`.
    pub fn welcome(&self, id: PlayerId) -> Option<Welcome> {
        if !self.players.contains_key(&id) {
            return None;
        }
        Some(Welcome {
            you: id,
            tick: self.tick,
            players: self.players.clone(),
            platforms: self.world.platforms().to_vec(),
            obstacles: self.world.obstacles().to_vec(),
            coins: self.world.coins().to_vec(),
        })
    }
}
