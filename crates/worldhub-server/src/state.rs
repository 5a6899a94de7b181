use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::lobby::Lobby;
use crate::registry::{RegistryError, WorldRegistry};

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<WorldRegistry>,
    pub lobby: Arc<Lobby>,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    /// Membership-change notices from rooms, consumed by the population
    /// broadcaster task.
    pub changes: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, RegistryError> {
        let (changes, _rx) = broadcast::channel(config.limits.broadcast_capacity);
        let registry = WorldRegistry::build(config.world_defs(), changes.clone())?;
        Ok(Self {
            registry: Arc::new(registry),
            lobby: Arc::new(Lobby::default()),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            changes,
        })
    }
}

/// RAII guard for the WebSocket connection count.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_guard_tracks_count() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _g1 = ConnectionGuard::new(Arc::clone(&count));
            let _g2 = ConnectionGuard::new(Arc::clone(&count));
            assert_eq!(count.load(Ordering::Relaxed), 2);
        }
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn new_state_builds_registry_from_config() {
        let state = AppState::new(ServerConfig::default()).unwrap();
        assert_eq!(state.registry.world_count(), 3);
        assert!(state.registry.resolve("/worlds/fireplane").is_some());
        assert_eq!(state.lobby.subscriber_count(), 0);
    }
}
