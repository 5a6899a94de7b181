use std::collections::HashMap;
use std::sync::Mutex;

use axum::extract::ws::Utf8Bytes;
use uuid::Uuid;

use worldhub_core::net::messages::{ServerMessage, WorldListMsg};
use worldhub_core::net::protocol::encode_server_message;
use worldhub_core::world::WorldStatus;

use crate::room::MemberSender;

/// Subscribers waiting on world-list pushes. Lobby connections never join
/// a world; they only receive population snapshots.
#[derive(Default)]
pub struct Lobby {
    subscribers: Mutex<HashMap<Uuid, MemberSender>>,
}

impl Lobby {
    pub fn subscribe(&self, sender: MemberSender) -> Uuid {
        let id = Uuid::new_v4();
        self.subscribers.lock().unwrap().insert(id, sender);
        id
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.lock().unwrap().remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Fan a fresh snapshot out to every subscriber. Encoded once; a full
    /// or closed channel is skipped, and that connection's socket task
    /// unsubscribes when it observes the dead socket.
    pub fn push_update(&self, worlds: Vec<WorldStatus>) {
        let msg = ServerMessage::WorldListUpdate(WorldListMsg { worlds });
        let text = match encode_server_message(&msg) {
            Ok(t) => Utf8Bytes::from(t),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode world list update");
                return;
            },
        };
        let subscribers = self.subscribers.lock().unwrap();
        for (id, sender) in subscribers.iter() {
            if let Err(e) = sender.try_send(text.clone()) {
                tracing::debug!(
                    subscriber = %id, error = %e,
                    "Skipping world list push to slow subscriber"
                );
            }
        }
    }
}
