use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use worldhub_core::net::messages::{ClientMessage, JoinRejectedMsg, RejectReason, ServerMessage};
use worldhub_core::net::protocol::{
    MAX_MESSAGE_SIZE, decode_client_message, encode_server_message,
};

use crate::room::{Room, SessionId};
use crate::state::{AppState, ConnectionGuard};

/// Maximum chat message length in characters.
const CHAT_MAX_CHARS: usize = 1024;

/// Upgrade handler for `/worlds/{world}`. Unknown worlds are refused with
/// 404 before the upgrade, so the client sees a failed handshake rather
/// than an opened-then-closed socket.
pub async fn world_ws_handler(
    State(state): State<AppState>,
    Path(world): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= state.config.limits.max_ws_connections {
        tracing::warn!(current, "Rejecting WebSocket connection: at capacity");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let Some(room) = state.registry.resolve(&format!("/worlds/{world}")) else {
        tracing::debug!(world = %world, "Rejecting WebSocket connection: unknown world");
        return StatusCode::NOT_FOUND.into_response();
    };

    ws.on_upgrade(move |socket| handle_world_socket(socket, state, room))
}

/// Upgrade handler for `/lobby`.
pub async fn lobby_ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= state.config.limits.max_ws_connections {
        tracing::warn!(current, "Rejecting lobby connection: at capacity");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.on_upgrade(move |socket| handle_lobby_socket(socket, state))
}

async fn handle_world_socket(socket: WebSocket, state: AppState, room: Arc<Room>) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // The first frame must be a joinWorld handshake.
    let handshake_timeout = Duration::from_secs(state.config.limits.handshake_timeout_secs);
    let join = match tokio::time::timeout(handshake_timeout, ws_receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => match decode_client_message(text.as_str()) {
            Ok(ClientMessage::JoinWorld(join)) => join,
            Ok(other) => {
                tracing::debug!(
                    world = %room.world().id,
                    message_type = other.message_type(),
                    "Expected joinWorld handshake"
                );
                send_rejection(&mut ws_sender, RejectReason::InvalidHandshake).await;
                return;
            },
            Err(e) => {
                tracing::debug!(world = %room.world().id, error = %e, "Bad handshake frame");
                send_rejection(&mut ws_sender, RejectReason::InvalidHandshake).await;
                return;
            },
        },
        Ok(Some(Ok(_))) => {
            send_rejection(&mut ws_sender, RejectReason::InvalidHandshake).await;
            return;
        },
        Ok(_) => return, // closed before handshake
        Err(_) => {
            tracing::debug!(world = %room.world().id, "Handshake timed out");
            return;
        },
    };

    let user_id = match join.user_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => {
            tracing::debug!(world = %room.world().id, "Handshake missing userID");
            send_rejection(&mut ws_sender, RejectReason::InvalidHandshake).await;
            return;
        },
    };
    if join.world_id != room.world().id {
        tracing::debug!(
            world = %room.world().id, claimed = %join.world_id,
            "Handshake world id does not match connection path"
        );
        send_rejection(&mut ws_sender, RejectReason::InvalidHandshake).await;
        return;
    }

    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.player_message_buffer);
    let grant = match room.join(&user_id, join.zone, join.state, tx) {
        Ok(grant) => grant,
        Err(reason) => {
            tracing::info!(
                user_id = %user_id, world = %room.world().id, reason = %reason,
                "Join rejected"
            );
            send_rejection(&mut ws_sender, reason).await;
            return;
        },
    };

    // Roster goes out on the raw sink before the writer task starts
    // draining the queue, so the joiner always sees it first.
    match encode_server_message(&grant.roster) {
        Ok(text) => {
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                room.leave(&user_id, grant.session);
                return;
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode roster");
            room.leave(&user_id, grant.session);
            return;
        },
    }

    tracing::info!(
        user_id = %user_id,
        world = %room.world().id,
        population = room.population(),
        "Player joined"
    );

    let writer = tokio::spawn(spawn_writer(ws_sender, rx));
    read_loop(&mut ws_receiver, &room, &user_id, grant.session).await;

    // Normal disconnect and leaveWorld converge here; the session guard
    // makes a second arrival a no-op.
    room.leave(&user_id, grant.session);
    writer.abort();
}

/// Drain the connection's outbound channel onto the socket.
async fn spawn_writer(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Utf8Bytes>,
) {
    while let Some(text) = rx.recv().await {
        if ws_sender.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    room: &Arc<Room>,
    user_id: &str,
    session: SessionId,
) {
    while let Some(Ok(msg)) = ws_receiver.next().await {
        let Message::Text(text) = msg else {
            // Ping/pong are handled by axum; binary and close fall through.
            if matches!(msg, Message::Close(_)) {
                break;
            }
            continue;
        };
        if text.len() > MAX_MESSAGE_SIZE {
            tracing::debug!(
                user_id = %user_id, size = text.len(),
                "Dropping oversized message"
            );
            continue;
        }
        let msg = match decode_client_message(text.as_str()) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(user_id = %user_id, error = %e, "Dropping malformed message");
                continue;
            },
        };
        match msg {
            ClientMessage::UpdatePlayer(update) => {
                room.update(user_id, session, update.state);
            },
            ClientMessage::SwitchZone(switch) => {
                room.switch_zone(user_id, session, switch.zone_name);
            },
            ClientMessage::ChatMessage(chat) => {
                // Sender identity comes from the session; a userID in the
                // body is ignored.
                if !chat_message_ok(&chat.message) {
                    tracing::debug!(user_id = %user_id, "Dropping invalid chat message");
                    continue;
                }
                room.chat(user_id, session, chat.message);
            },
            ClientMessage::LeaveWorld => break,
            ClientMessage::JoinWorld(_) => {
                tracing::debug!(user_id = %user_id, "Ignoring joinWorld on joined connection");
            },
        }
    }
}

fn chat_message_ok(message: &str) -> bool {
    !message.is_empty()
        && message.chars().count() <= CHAT_MAX_CHARS
        && !message.chars().any(|c| c.is_control() && c != '\n')
}

async fn send_rejection(ws_sender: &mut SplitSink<WebSocket, Message>, reason: RejectReason) {
    let msg = ServerMessage::JoinRejected(JoinRejectedMsg { reason });
    if let Ok(text) = encode_server_message(&msg) {
        let _ = ws_sender.send(Message::Text(text.into())).await;
    }
    let _ = ws_sender.close().await;
}

async fn handle_lobby_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Subscribe before taking the snapshot: any change racing with the
    // initial send also lands in the channel, so the subscriber may see a
    // duplicate snapshot but never a gap.
    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.player_message_buffer);
    let id = state.lobby.subscribe(tx);

    let initial = ServerMessage::WorldList(worldhub_core::net::messages::WorldListMsg {
        worlds: state.registry.snapshot(),
    });
    match encode_server_message(&initial) {
        Ok(text) => {
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                state.lobby.unsubscribe(id);
                return;
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode world list");
            state.lobby.unsubscribe(id);
            return;
        },
    }

    tracing::debug!(subscriber = %id, "Lobby subscriber connected");
    let writer = tokio::spawn(spawn_writer(ws_sender, rx));

    // Lobby clients send nothing meaningful; just wait for the close.
    while let Some(Ok(msg)) = ws_receiver.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    state.lobby.unsubscribe(id);
    writer.abort();
    tracing::debug!(subscriber = %id, "Lobby subscriber disconnected");
}
