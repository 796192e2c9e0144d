use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use chunkrun_core::PlayerId;
use chunkrun_core::net::messages::{
    PlayerJoinedMsg, PlayerLeftMsg, ServerMessage, UpdateMsg, WelcomeMsg, WorldGrewMsg,
};
use chunkrun_core::net::protocol::encode_server_message;
use chunkrun_sim::{Direction, SimEvent, Simulation, TickReport};

use crate::state::WorldStats;

/// Commands sent from the WebSocket handlers to the game loop.
#[derive(Debug)]
pub enum GameCommand {
    /// Add a player. `tx` receives every frame for that player, starting with
    /// the `Welcome`.
    Join {
        name: String,
        tx: mpsc::Sender<Bytes>,
        reply: oneshot::Sender<Result<PlayerId, String>>,
    },
    Move {
        player_id: PlayerId,
        direction: Direction,
    },
    Disconnect {
        player_id: PlayerId,
    },
    Stop,
}

/// Outbound channels of every joined player.
#[derive(Default)]
struct Clients {
    senders: HashMap<PlayerId, mpsc::Sender<Bytes>>,
}

impl Clients {
    fn insert(&mut self, player_id: PlayerId, tx: mpsc::Sender<Bytes>) {
        self.senders.insert(player_id, tx);
    }

    fn remove(&mut self, player_id: PlayerId) {
        self.senders.remove(&player_id);
    }

    fn send_to(&self, player_id: PlayerId, data: &Bytes) {
        if let Some(tx) = self.senders.get(&player_id) {
            try_send(player_id, tx, data);
        }
    }

    fn broadcast(&self, data: &Bytes) {
        for (&player_id, tx) in &self.senders {
            try_send(player_id, tx, data);
        }
    }

    fn broadcast_except(&self, except: PlayerId, data: &Bytes) {
        for (&player_id, tx) in &self.senders {
            if player_id != except {
                try_send(player_id, tx, data);
            }
        }
    }
}

fn try_send(player_id: PlayerId, tx: &mpsc::Sender<Bytes>, data: &Bytes) {
    if let Err(e) = tx.try_send(data.clone()) {
        tracing::debug!(player_id, error = %e, "Dropped outbound frame");
    }
}

/// Encode a server message, logging instead of failing.
fn encode(msg: &ServerMessage) -> Option<Bytes> {
    match encode_server_message(msg) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server message");
            None
        },
    }
}

fn to_msgpack<T: Serialize>(value: &T) -> Option<Vec<u8>> {
    match rmp_serde::to_vec(value) {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize payload");
            None
        },
    }
}

/// Spawn the game loop as a tokio task. It owns `sim` exclusively until a
/// `Stop` arrives or every command sender is dropped.
pub fn spawn_game_loop(
    sim: Simulation,
    stats: Arc<WorldStats>,
) -> (mpsc::UnboundedSender<GameCommand>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_game_loop(sim, stats, cmd_rx));
    (cmd_tx, handle)
}

async fn run_game_loop(
    mut sim: Simulation,
    stats: Arc<WorldStats>,
    mut cmd_rx: mpsc::UnboundedReceiver<GameCommand>,
) {
    let tick_interval = Duration::from_secs_f32(1.0 / sim.config().tick_rate_hz);
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut clients = Clients::default();
    publish_stats(&sim, &stats);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = sim.tick();
                broadcast_tick(&sim, &report, &clients);
                publish_stats(&sim, &stats);
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(GameCommand::Join { name, tx, reply }) => {
                        let result = handle_join(&mut sim, &mut clients, &name, tx);
                        if let Err(Ok(player_id)) = reply.send(result) {
                            // The connection went away before it learned its id.
                            clients.remove(player_id);
                            handle_disconnect(&mut sim, &clients, player_id);
                        }
                        publish_stats(&sim, &stats);
                    },
                    Some(GameCommand::Move { player_id, direction }) => {
                        sim.apply_move(player_id, direction);
                    },
                    Some(GameCommand::Disconnect { player_id }) => {
                        clients.remove(player_id);
                        handle_disconnect(&mut sim, &clients, player_id);
                        publish_stats(&sim, &stats);
                    },
                    Some(GameCommand::Stop) | None => break,
                }
            }
        }
    }

    tracing::info!(tick = sim.tick_count(), "Game loop stopped");
}

/// Add the player, send them the full world and announce them to everyone
/// else.
fn handle_join(
    sim: &mut Simulation,
    clients: &mut Clients,
    name: &str,
    tx: mpsc::Sender<Bytes>,
) -> Result<PlayerId, String> {
    let player_id = sim.join(name);

    let welcome = sim
        .welcome(player_id)
        .and_then(|w| to_msgpack(&w))
        .and_then(|world_data| {
            encode(&ServerMessage::Welcome(WelcomeMsg {
                player_id,
                tick: sim.tick_count(),
                world_data,
            }))
        });
    let Some(welcome) = welcome else {
        sim.disconnect(player_id);
        return Err("Failed to build world state".to_string());
    };

    if let Some(joined) = sim
        .player(player_id)
        .and_then(to_msgpack)
        .and_then(|player_data| {
            encode(&ServerMessage::PlayerJoined(PlayerJoinedMsg {
                player_id,
                player_data,
            }))
        })
    {
        clients.broadcast_except(player_id, &joined);
    }

    clients.insert(player_id, tx);
    clients.send_to(player_id, &welcome);
    Ok(player_id)
}

fn handle_disconnect(sim: &mut Simulation, clients: &Clients, player_id: PlayerId) {
    if !sim.disconnect(player_id) {
        return;
    }
    if let Some(left) = encode(&ServerMessage::PlayerLeft(PlayerLeftMsg { player_id })) {
        clients.broadcast(&left);
    }
}

/// One `WorldGrew` per new chunk, then the tick's `Update`.
fn broadcast_tick(sim: &Simulation, report: &TickReport, clients: &Clients) {
    for event in &report.events {
        match event {
            SimEvent::WorldGrew { chunk } => {
                tracing::debug!(tick = report.tick, chunk, "World grew");
            },
            other => tracing::debug!(tick = report.tick, event = ?other, "Sim event"),
        }
    }

    for chunk in &report.grown {
        let Some(chunk_data) = to_msgpack(chunk) else {
            continue;
        };
        if let Some(data) = encode(&ServerMessage::WorldGrew(WorldGrewMsg {
            chunk_index: chunk.index,
            chunk_data,
        })) {
            clients.broadcast(&data);
        }
    }

    let Some(state_data) = to_msgpack(&sim.snapshot()) else {
        return;
    };
    match encode_server_message(&ServerMessage::Update(UpdateMsg {
        tick: report.tick,
        state_data,
    })) {
        Ok(data) => clients.broadcast(&Bytes::from(data)),
        Err(e) => tracing::error!(tick = report.tick, error = %e, "Failed to encode Update"),
    }
}

fn publish_stats(sim: &Simulation, stats: &WorldStats) {
    stats.players.store(sim.player_count(), Ordering::Relaxed);
    stats
        .chunks
        .store(sim.world().chunk_count(), Ordering::Relaxed);
    stats.tick.store(sim.tick_count(), Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use chunkrun_core::net::protocol::decode_server_message;
    use chunkrun_sim::player::Player;
    use chunkrun_sim::{ManualClock, SimConfig, Snapshot, Welcome};

    use super::*;

    fn test_sim() -> Simulation {
        let mut config = SimConfig::default();
        config.world.seed = Some(7);
        config.world.initial_chunks = 2;
        Simulation::with_clock(config, Box::new(ManualClock::new(0)))
    }

    async fn join(
        cmd_tx: &mpsc::UnboundedSender<GameCommand>,
        name: &str,
    ) -> (PlayerId, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(64);
        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(GameCommand::Join {
                name: name.to_string(),
                tx,
                reply: reply_tx,
            })
            .unwrap();
        let player_id = reply_rx.await.unwrap().unwrap();
        (player_id, rx)
    }

    async fn recv(rx: &mut mpsc::Receiver<Bytes>) -> ServerMessage {
        let data = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("channel closed");
        decode_server_message(&data).unwrap()
    }

    /// Skip frames until one matches `pred`.
    async fn recv_until(
        rx: &mut mpsc::Receiver<Bytes>,
        pred: impl Fn(&ServerMessage) -> bool,
    ) -> ServerMessage {
        for _ in 0..500 {
            let msg = recv(rx).await;
            if pred(&msg) {
                return msg;
            }
        }
        panic!("expected frame never arrived");
    }

    #[tokio::test]
    async fn join_sends_welcome_first() {
        let stats = Arc::new(WorldStats::default());
        let (cmd_tx, handle) = spawn_game_loop(test_sim(), Arc::clone(&stats));

        let (player_id, mut rx) = join(&cmd_tx, "alice").await;
        assert_eq!(player_id, 1);

        match recv(&mut rx).await {
            ServerMessage::Welcome(w) => {
                assert_eq!(w.player_id, player_id);
                let world: Welcome = rmp_serde::from_slice(&w.world_data).unwrap();
                assert_eq!(world.you, player_id);
                assert_eq!(world.players[&player_id].name, "alice");
                assert!(!world.platforms.is_empty());
            },
            other => panic!("expected Welcome, got {other:?}"),
        }

        cmd_tx.send(GameCommand::Stop).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn other_players_see_join_and_leave() {
        let stats = Arc::new(WorldStats::default());
        let (cmd_tx, handle) = spawn_game_loop(test_sim(), Arc::clone(&stats));

        let (alice, mut alice_rx) = join(&cmd_tx, "alice").await;
        let (bob, _bob_rx) = join(&cmd_tx, "bob").await;

        let joined = recv_until(&mut alice_rx, |m| {
            matches!(m, ServerMessage::PlayerJoined(_))
        })
        .await;
        let ServerMessage::PlayerJoined(joined) = joined else {
            unreachable!();
        };
        assert_eq!(joined.player_id, bob);
        let player: Player = rmp_serde::from_slice(&joined.player_data).unwrap();
        assert_eq!(player.name, "bob");
        assert_ne!(bob, alice);

        cmd_tx
            .send(GameCommand::Disconnect { player_id: bob })
            .unwrap();
        let left = recv_until(&mut alice_rx, |m| matches!(m, ServerMessage::PlayerLeft(_))).await;
        assert_eq!(
            left,
            ServerMessage::PlayerLeft(PlayerLeftMsg { player_id: bob })
        );

        cmd_tx.send(GameCommand::Stop).unwrap();
        handle.await.unwrap();
        assert_eq!(stats.players(), 1);
    }

    #[tokio::test]
    async fn ticks_broadcast_updates() {
        let stats = Arc::new(WorldStats::default());
        let (cmd_tx, handle) = spawn_game_loop(test_sim(), Arc::clone(&stats));

        let (player_id, mut rx) = join(&cmd_tx, "runner").await;
        cmd_tx
            .send(GameCommand::Move {
                player_id,
                direction: Direction::Right,
            })
            .unwrap();

        let update = recv_until(&mut rx, |m| matches!(m, ServerMessage::Update(_))).await;
        let ServerMessage::Update(update) = update else {
            unreachable!();
        };
        assert!(update.tick >= 1);
        let snapshot: Snapshot = rmp_serde::from_slice(&update.state_data).unwrap();
        assert_eq!(snapshot.tick, update.tick);
        assert!(snapshot.players.contains_key(&player_id));

        cmd_tx.send(GameCommand::Stop).unwrap();
        handle.await.unwrap();
        assert!(stats.tick() >= 1);
        assert!(stats.chunks() >= 2);
    }

    #[tokio::test]
    async fn full_client_channel_does_not_stall_the_loop() {
        let stats = Arc::new(WorldStats::default());
        let (cmd_tx, handle) = spawn_game_loop(test_sim(), Arc::clone(&stats));

        // Capacity 1: the Welcome fills it and every later frame is dropped.
        let (tx, _rx) = mpsc::channel(1);
        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(GameCommand::Join {
                name: "slow".to_string(),
                tx,
                reply: reply_tx,
            })
            .unwrap();
        reply_rx.await.unwrap().unwrap();

        let (_fast, mut fast_rx) = join(&cmd_tx, "fast").await;
        recv_until(&mut fast_rx, |m| matches!(m, ServerMessage::Update(_))).await;
        recv_until(&mut fast_rx, |m| matches!(m, ServerMessage::Update(_))).await;

        cmd_tx.send(GameCommand::Stop).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_reply_removes_player() {
        let stats = Arc::new(WorldStats::default());
        let (cmd_tx, handle) = spawn_game_loop(test_sim(), Arc::clone(&stats));

        let (tx, _rx) = mpsc::channel(8);
        let (reply_tx, reply_rx) = oneshot::channel();
        drop(reply_rx);
        cmd_tx
            .send(GameCommand::Join {
                name: "ghost".to_string(),
                tx,
                reply: reply_tx,
            })
            .unwrap();

        let (_id, _rx2) = join(&cmd_tx, "real").await;
        cmd_tx.send(GameCommand::Stop).unwrap();
        handle.await.unwrap();
        assert_eq!(stats.players(), 1);
    }

    #[tokio::test]
    async fn loop_exits_when_senders_drop() {
        let stats = Arc::new(WorldStats::default());
        let (cmd_tx, handle) = spawn_game_loop(test_sim(), stats);
        drop(cmd_tx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
