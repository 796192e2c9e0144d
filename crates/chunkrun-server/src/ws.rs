use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};

use chunkrun_core::PlayerId;
use chunkrun_core::net::messages::{ClientMessage, JoinErrorMsg, ServerMessage};
use chunkrun_core::net::protocol::{
    MAX_CLIENT_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, decode_message_type,
    encode_server_message,
};
use chunkrun_sim::Direction;

use crate::game_loop::GameCommand;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    ws.on_upgrade(move |socket| handle_socket(socket, state, guard))
}

async fn handle_socket(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // The first frame must be a Join.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };
    if first_msg.len() > MAX_CLIENT_MESSAGE_SIZE {
        tracing::debug!(len = first_msg.len(), "Oversized first frame");
        return;
    }
    let join = match decode_client_message(&first_msg) {
        Ok(ClientMessage::Join(join)) => join,
        Ok(other) => {
            tracing::debug!(msg = ?other, "First frame was not a Join");
            return;
        },
        Err(e) => {
            tracing::debug!(error = %e, "Undecodable first frame");
            return;
        },
    };

    if join.protocol_version != 0 && join.protocol_version != PROTOCOL_VERSION {
        send_join_error(
            &mut ws_sender,
            &format!(
                "Protocol version mismatch: client={}, server={}",
                join.protocol_version, PROTOCOL_VERSION
            ),
        )
        .await;
        return;
    }

    let name = match validate_name(&join.player_name, state.config.limits.max_name_len) {
        Ok(name) => name,
        Err(err) => {
            send_join_error(&mut ws_sender, err).await;
            return;
        },
    };

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    let (reply_tx, reply_rx) = oneshot::channel();
    let sent = state.cmd_tx.send(GameCommand::Join {
        name,
        tx,
        reply: reply_tx,
    });
    if sent.is_err() {
        send_join_error(&mut ws_sender, "Server is shutting down").await;
        return;
    }
    let player_id = match reply_rx.await {
        Ok(Ok(player_id)) => player_id,
        Ok(Err(err)) => {
            send_join_error(&mut ws_sender, &err).await;
            return;
        },
        Err(_) => return,
    };

    let writer = spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, player_id).await;

    let _ = state.cmd_tx.send(GameCommand::Disconnect { player_id });
    writer.abort();
    tracing::debug!(player_id, "Connection closed");
}

/// Trim and check a requested display name. Blank names are allowed and
/// become "Anonymous" in the simulation.
fn validate_name(raw: &str, max_len: usize) -> Result<String, &'static str> {
    let name = raw.trim();
    if name.chars().count() > max_len {
        return Err("Player name too long");
    }
    if name.chars().any(char::is_control) {
        return Err("Player name contains control characters");
    }
    Ok(name.to_string())
}

async fn send_join_error(ws_sender: &mut SplitSink<WebSocket, Message>, error: &str) {
    let msg = ServerMessage::JoinError(JoinErrorMsg {
        error: error.to_string(),
    });
    match encode_server_message(&msg) {
        Ok(response) => {
            if let Err(e) = ws_sender.send(Message::Binary(response.into())).await {
                tracing::warn!(error = %e, "Failed to send join error response");
            }
        },
        Err(e) => tracing::error!(error = %e, "Failed to encode JoinError"),
    }
    let _ = ws_sender.close().await;
}

fn spawn_writer(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
    })
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Forward movement intents until the client goes away.
async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    player_id: PlayerId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if data.is_empty() || data.len() > MAX_CLIENT_MESSAGE_SIZE {
            continue;
        }

        if !rate_limiter.allow() {
            tracing::warn!(player_id, "Rate limited");
            continue;
        }

        let msg_type = match decode_message_type(&data) {
            Ok(t) => t,
            Err(_) => continue,
        };
        if msg_type.is_server_only() {
            tracing::warn!(
                player_id,
                ?msg_type,
                "Rejected server-only message from client"
            );
            continue;
        }

        match decode_client_message(&data) {
            Ok(ClientMessage::Move(mv)) => {
                let Some(direction) = Direction::from_wire(&mv.direction) else {
                    tracing::debug!(player_id, direction = %mv.direction, "Unknown direction");
                    continue;
                };
                if state
                    .cmd_tx
                    .send(GameCommand::Move {
                        player_id,
                        direction,
                    })
                    .is_err()
                {
                    break;
                }
            },
            Ok(ClientMessage::Join(_)) => {
                tracing::debug!(player_id, "Ignoring repeated Join");
            },
            Err(e) => {
                tracing::debug!(player_id, error = %e, "Undecodable client frame");
            },
        }
    }
}
