use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use worldhub_core::net::messages::{ClientMessage, ServerMessage};
use worldhub_core::net::protocol::{decode_server_message, encode_client_message};
use worldhub_server::config::{ServerConfig, WorldEntry};
use worldhub_server::{build_app, spawn_population_broadcaster};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: std::net::SocketAddr,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(ServerConfig::default()).await
    }

    pub async fn spawn_with(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");

        let (app, state) = build_app(config).expect("build app");
        spawn_population_broadcaster(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self { addr }
    }

    /// Default catalog plus one extra world with a small capacity.
    pub async fn spawn_with_tiny_world(capacity: usize) -> Self {
        let mut config = ServerConfig::default();
        config.worlds.push(WorldEntry {
            id: "tiny".to_string(),
            name: "Tiny".to_string(),
            path: None,
            capacity,
            theme: None,
        });
        Self::spawn_with(config).await
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub async fn connect(&self, path: &str) -> WsStream {
        let (ws, _) = connect_async(self.ws_url(path))
            .await
            .expect("websocket connect");
        ws
    }
}

pub async fn send_msg(ws: &mut WsStream, msg: &ClientMessage) {
    let text = encode_client_message(msg).expect("encode client message");
    ws.send(Message::text(text)).await.expect("send frame");
}

pub async fn send_raw(ws: &mut WsStream, text: &str) {
    ws.send(Message::text(text)).await.expect("send frame");
}

/// Receive the next server text frame, failing the test after 5 seconds.
pub async fn recv_msg(ws: &mut WsStream) -> ServerMessage {
    let deadline = Duration::from_secs(5);
    loop {
        let frame = tokio::time::timeout(deadline, ws.next())
            .await
            .expect("timed out waiting for server message")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return decode_server_message(text.as_str()).expect("decode server message");
        }
    }
}

/// Try to receive a server frame within a short window; None if quiet.
pub async fn try_recv_msg(ws: &mut WsStream) -> Option<ServerMessage> {
    let window = Duration::from_millis(200);
    loop {
        match tokio::time::timeout(window, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return Some(decode_server_message(text.as_str()).expect("decode server message"));
            },
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}
