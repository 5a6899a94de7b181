use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use worldhub_core::net::messages::{
    ChatBroadcastMsg, PlayerLeftMsg, PlayerListMsg, PlayerMovedMsg, PlayerUpdateMsg, RejectReason,
    ServerMessage,
};
use worldhub_core::net::protocol::encode_server_message;
use worldhub_core::player::{PlayerSnapshot, StateBlob};
use worldhub_core::world::{WorldDef, WorldStatus};

/// Per-member sender for outbound WebSocket text frames.
/// Bounded to prevent memory exhaustion from slow clients. `Utf8Bytes`
/// clones share one encoded buffer across all recipients of a broadcast.
pub type MemberSender = mpsc::Sender<Utf8Bytes>;

/// Identifies one live session; a reconnect always gets a fresh id.
pub type SessionId = Uuid;

/// Zone assigned to joiners that don't request one.
pub const DEFAULT_ZONE: &str = "main";

/// Identities with a live session anywhere on the hub. Shared by every
/// room: an identity holds a session in at most one world at a time.
/// Rooms claim on join and release on leave inside their own critical
/// sections; the index lock is held only for the hash operation itself.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    live: Mutex<HashSet<String>>,
}

impl IdentityIndex {
    /// True if the identity was free and is now claimed.
    fn claim(&self, user_id: &str) -> bool {
        self.live.lock().unwrap().insert(user_id.to_string())
    }

    fn release(&self, user_id: &str) {
        self.live.lock().unwrap().remove(user_id);
    }
}

/// Live session record for one joined connection. Owned by its room;
/// mutated only on behalf of its own connection.
#[derive(Debug)]
struct Member {
    session: SessionId,
    zone: String,
    state: StateBlob,
    joined_at: Instant,
    sender: MemberSender,
}

impl Member {
    fn snapshot(&self, user_id: &str) -> PlayerSnapshot {
        PlayerSnapshot {
            user_id: user_id.to_string(),
            zone: self.zone.clone(),
            state: self.state.clone(),
        }
    }
}

/// Returned on a successful join.
#[derive(Debug)]
pub struct JoinGrant {
    pub session: SessionId,
    /// Membership snapshot as it stood at join time, excluding the joiner.
    pub roster: ServerMessage,
}

/// The live runtime instance owning one world's membership.
///
/// Every public operation runs under the room's own mutex, so operations
/// on the same room serialize while different rooms proceed in parallel.
/// Broadcasts happen inside that critical section, which is what preserves
/// program order per room; nothing awaits while the lock is held.
#[derive(Debug)]
pub struct Room {
    world: WorldDef,
    members: Mutex<HashMap<String, Member>>,
    /// Membership-change notices for the population broadcaster; payload
    /// is the world id.
    changes: broadcast::Sender<String>,
    identities: Arc<IdentityIndex>,
}

impl Room {
    pub fn new(
        world: WorldDef,
        changes: broadcast::Sender<String>,
        identities: Arc<IdentityIndex>,
    ) -> Self {
        Self {
            world,
            members: Mutex::new(HashMap::new()),
            changes,
            identities,
        }
    }

    pub fn world(&self) -> &WorldDef {
        &self.world
    }

    /// Live member count, read from the membership table itself.
    pub fn population(&self) -> usize {
        self.members.lock().unwrap().len()
    }

    /// Lobby-facing status, recomputed from live membership on every call.
    pub fn status(&self) -> WorldStatus {
        self.world.status(self.population())
    }

    /// Register a new session. Capacity and duplicate checks, the insert,
    /// the `playerJoined` broadcast, and the change notice are one atomic
    /// unit; no other operation on this room can interleave.
    ///
    /// The identity claim covers the whole hub, so a second join under a
    /// live identity is rejected even when it targets a different world.
    pub fn join(
        &self,
        user_id: &str,
        zone: Option<String>,
        state: StateBlob,
        sender: MemberSender,
    ) -> Result<JoinGrant, RejectReason> {
        let mut members = self.members.lock().unwrap();

        if !self.identities.claim(user_id) {
            return Err(RejectReason::DuplicateIdentity);
        }
        if members.len() >= self.world.capacity {
            self.identities.release(user_id);
            return Err(RejectReason::Full);
        }

        let member = Member {
            session: Uuid::new_v4(),
            zone: zone.unwrap_or_else(|| DEFAULT_ZONE.to_string()),
            state,
            joined_at: Instant::now(),
            sender,
        };
        let session = member.session;

        // Announce to everyone already present, then snapshot the roster
        // for the joiner; the joiner is inserted after both, so it neither
        // hears its own announcement nor appears in its own roster.
        let joined = ServerMessage::PlayerJoined(member.snapshot(user_id));
        let stalled = self.broadcast(&members, None, &joined);
        self.evict_stalled(&mut members, stalled);

        let players = members.iter().map(|(id, m)| m.snapshot(id)).collect();
        let roster = ServerMessage::PlayerList(PlayerListMsg { players });

        members.insert(user_id.to_string(), member);
        self.notify_change();

        Ok(JoinGrant { session, roster })
    }

    /// Merge a state delta into the caller's own session and relay it to
    /// every other member. Silently ignored when the session is gone
    /// (late message after disconnect).
    pub fn update(&self, user_id: &str, session: SessionId, delta: StateBlob) {
        let mut members = self.members.lock().unwrap();
        {
            let Some(member) = members.get_mut(user_id) else {
                return;
            };
            if member.session != session {
                return;
            }
            for (key, value) in &delta {
                member.state.insert(key.clone(), value.clone());
            }
        }
        let msg = ServerMessage::PlayerUpdate(PlayerUpdateMsg {
            user_id: user_id.to_string(),
            state: delta,
        });
        let stalled = self.broadcast(&members, Some(session), &msg);
        self.evict_stalled(&mut members, stalled);
    }

    /// Move the caller's own session to a new sub-zone and tell everyone
    /// else. Silently ignored for a dead session.
    pub fn switch_zone(&self, user_id: &str, session: SessionId, zone_name: String) {
        let mut members = self.members.lock().unwrap();
        {
            let Some(member) = members.get_mut(user_id) else {
                return;
            };
            if member.session != session {
                return;
            }
            member.zone = zone_name.clone();
        }
        let msg = ServerMessage::PlayerMoved(PlayerMovedMsg {
            user_id: user_id.to_string(),
            zone_name,
        });
        let stalled = self.broadcast(&members, Some(session), &msg);
        self.evict_stalled(&mut members, stalled);
    }

    /// Relay chat to the whole room, sender included; the echo doubles as
    /// delivery confirmation. Identity comes from the session, never from
    /// the message body.
    pub fn chat(&self, user_id: &str, session: SessionId, message: String) {
        let mut members = self.members.lock().unwrap();
        match members.get(user_id) {
            Some(member) if member.session == session => {},
            _ => return,
        }
        let msg = ServerMessage::ChatMessage(ChatBroadcastMsg {
            user_id: user_id.to_string(),
            message,
        });
        let stalled = self.broadcast(&members, None, &msg);
        self.evict_stalled(&mut members, stalled);
    }

    /// Remove a session. Idempotent: a second call for the same session,
    /// or a stale session id after a rejoin, is a no-op. Returns true when
    /// membership actually changed.
    pub fn leave(&self, user_id: &str, session: SessionId) -> bool {
        let mut members = self.members.lock().unwrap();
        match members.get(user_id) {
            Some(member) if member.session == session => {},
            _ => return false,
        }
        let member = members.remove(user_id).unwrap();
        self.identities.release(user_id);
        tracing::info!(
            user_id = %user_id,
            world = %self.world.id,
            online_secs = member.joined_at.elapsed().as_secs(),
            "Player left"
        );

        let msg = ServerMessage::PlayerLeft(PlayerLeftMsg {
            user_id: user_id.to_string(),
        });
        let stalled = self.broadcast(&members, None, &msg);
        self.notify_change();
        self.evict_stalled(&mut members, stalled);
        true
    }

    fn notify_change(&self) {
        // A send error only means no broadcaster task is subscribed yet;
        // snapshots recompute from membership, so nothing is lost.
        let _ = self.changes.send(self.world.id.clone());
    }

    /// Delivery primitive: encode once, then best-effort non-blocking send
    /// to every member except `exclude`. A closed channel is skipped; that
    /// connection's own socket task runs the leave path when it observes
    /// the dead socket. A full channel marks the member stalled, and the
    /// caller evicts it.
    fn broadcast(
        &self,
        members: &HashMap<String, Member>,
        exclude: Option<SessionId>,
        msg: &ServerMessage,
    ) -> Vec<(String, SessionId)> {
        let mut stalled = Vec::new();
        let text = match encode_server_message(msg) {
            Ok(t) => Utf8Bytes::from(t),
            Err(e) => {
                tracing::warn!(world = %self.world.id, error = %e, "Failed to encode broadcast");
                return stalled;
            },
        };
        for (user_id, member) in members {
            if Some(member.session) == exclude {
                continue;
            }
            match member.sender.try_send(text.clone()) {
                Ok(()) => {},
                Err(TrySendError::Full(_)) => {
                    stalled.push((user_id.clone(), member.session));
                },
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        user_id = %user_id, world = %self.world.id,
                        "Skipping broadcast to closed connection"
                    );
                },
            }
        }
        stalled
    }

    /// Tear down members whose outbound buffers were full during a
    /// broadcast. A full buffer means the client stopped reading; leaving
    /// it in the membership table would let it silently miss departures
    /// and arrivals forever. Removal goes through the same steps as a
    /// leave, and the evicted connection's own later leave is a
    /// session-guarded no-op. Each pass removes a member, so the loop is
    /// bounded even when a `playerLeft` broadcast stalls someone else.
    fn evict_stalled(
        &self,
        members: &mut HashMap<String, Member>,
        mut stalled: Vec<(String, SessionId)>,
    ) {
        while let Some((user_id, session)) = stalled.pop() {
            match members.get(&user_id) {
                Some(member) if member.session == session => {},
                _ => continue,
            }
            members.remove(&user_id);
            self.identities.release(&user_id);
            tracing::warn!(
                user_id = %user_id,
                world = %self.world.id,
                "Evicting member with stalled outbound buffer"
            );
            let msg = ServerMessage::PlayerLeft(PlayerLeftMsg {
                user_id: user_id.clone(),
            });
            stalled.extend(self.broadcast(members, None, &msg));
            self.notify_change();
        }
    }
}
