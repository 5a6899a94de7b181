use axum::Json;
use axum::extract::State;
use serde::Serialize;

use worldhub_core::world::WorldStatus;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WorldListResponse {
    pub worlds: Vec<WorldStatus>,
}

/// GET /api/v1/worlds — the same snapshot the lobby socket pushes, for
/// clients that poll instead of subscribing.
pub async fn get_worlds(State(state): State<AppState>) -> Json<WorldListResponse> {
    Json(WorldListResponse {
        worlds: state.registry.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[tokio::test]
    async fn worlds_endpoint_lists_configured_worlds() {
        let state = AppState::new(ServerConfig::default()).unwrap();
        let Json(response) = get_worlds(State(state)).await;
        assert_eq!(response.worlds.len(), 3);
        assert_eq!(response.worlds[0].id, "fireplane");
        assert_eq!(response.worlds[0].population, 0);
    }
}
