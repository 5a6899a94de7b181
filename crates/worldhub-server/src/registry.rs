use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;

use worldhub_core::world::{WorldDef, WorldStatus};

use crate::room::{IdentityIndex, Room};

/// Why the world catalog was rejected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicatePath(String),
    DuplicateId(String),
    ZeroCapacity(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicatePath(p) => write!(f, "duplicate world routing path: {p}"),
            Self::DuplicateId(id) => write!(f, "duplicate world id: {id}"),
            Self::ZeroCapacity(id) => write!(f, "world {id} has zero capacity"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Read-only-after-init mapping from routing path to live room. Built once
/// at startup; resolution needs no lock, and rooms lock independently.
#[derive(Debug)]
pub struct WorldRegistry {
    /// Registration order, which is also snapshot order.
    rooms: Vec<Arc<Room>>,
    by_path: HashMap<String, Arc<Room>>,
}

impl WorldRegistry {
    /// Validate the catalog and spin up one room per world. Path and id
    /// collisions are registration-time errors, never request-time.
    ///
    /// All rooms share one identity index, which is what makes a live
    /// identity exclusive across worlds, not just within one.
    pub fn build(
        worlds: Vec<WorldDef>,
        changes: broadcast::Sender<String>,
    ) -> Result<Self, RegistryError> {
        let identities = Arc::new(IdentityIndex::default());
        let mut rooms: Vec<Arc<Room>> = Vec::with_capacity(worlds.len());
        let mut by_path = HashMap::new();

        for def in worlds {
            if def.capacity == 0 {
                return Err(RegistryError::ZeroCapacity(def.id));
            }
            if rooms.iter().any(|r| r.world().id == def.id) {
                return Err(RegistryError::DuplicateId(def.id));
            }
            let room = Arc::new(Room::new(def, changes.clone(), Arc::clone(&identities)));
            let path = room.world().path.clone();
            if by_path.insert(path.clone(), Arc::clone(&room)).is_some() {
                return Err(RegistryError::DuplicatePath(path));
            }
            rooms.push(room);
        }

        Ok(Self { rooms, by_path })
    }

    /// Exact-match lookup of a requested routing path.
    pub fn resolve(&self, path: &str) -> Option<Arc<Room>> {
        self.by_path.get(path).map(Arc::clone)
    }

    /// Fresh population snapshot in registration order, computed from live
    /// membership sizes — never from a separately maintained counter.
    pub fn snapshot(&self) -> Vec<WorldStatus> {
        self.rooms.iter().map(|r| r.status()).collect()
    }

    pub fn world_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.population()).sum()
    }
}
