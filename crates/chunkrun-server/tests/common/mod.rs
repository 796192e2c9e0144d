use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chunkrun_core::PlayerId;
use chunkrun_core::net::messages::{ClientMessage, JoinMsg, MoveMsg, ServerMessage};
use chunkrun_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_message, encode_client_message,
};
use chunkrun_sim::Welcome;

use chunkrun_server::build_app;
use chunkrun_server::config::ServerConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with a small seeded world.
    pub async fn new() -> Self {
        Self::from_config(test_config()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        ..ServerConfig::default()
    };
    config.simulation.world.seed = Some(2024);
    config.simulation.world.initial_chunks = 3;
    config
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

pub async fn ws_send_join(stream: &mut WsStream, name: &str) {
    let msg = ClientMessage::Join(JoinMsg {
        player_name: name.to_string(),
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send_client_msg(stream, &msg).await;
}

pub async fn ws_send_move(stream: &mut WsStream, direction: &str) {
    let msg = ClientMessage::Move(MoveMsg {
        direction: direction.to_string(),
    });
    ws_send_client_msg(stream, &msg).await;
}

/// Join and return the Welcome. Panics on anything else.
pub async fn ws_join(stream: &mut WsStream, name: &str) -> (PlayerId, Welcome) {
    ws_send_join(stream, name).await;
    match ws_read_server_msg(stream).await {
        ServerMessage::Welcome(w) => {
            let world: Welcome = rmp_serde::from_slice(&w.world_data).unwrap();
            assert_eq!(world.you, w.player_id);
            (w.player_id, world)
        },
        other => panic!("Expected Welcome, got: {other:?}"),
    }
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Read until a message matches `pred`, skipping Updates and anything else.
pub async fn ws_read_until(
    stream: &mut WsStream,
    pred: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    for _ in 0..1000 {
        let msg = ws_read_server_msg(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
    panic!("Expected message never arrived");
}

/// True once the server has closed the connection (or it errored), false if
/// it is still open after `timeout_ms`.
pub async fn ws_wait_closed(stream: &mut WsStream, timeout_ms: u64) -> bool {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                _ => continue,
            }
        }
    })
    .await
    .is_ok()
}
