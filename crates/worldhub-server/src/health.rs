use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connections: ConnectionStats,
    pub worlds: WorldStats,
}

#[derive(Debug, Serialize)]
pub struct ConnectionStats {
    pub websocket: usize,
    pub lobby_subscribers: usize,
}

#[derive(Debug, Serialize)]
pub struct WorldStats {
    pub configured: usize,
    pub players: usize,
}

/// GET /healthz
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: ConnectionStats {
            websocket: state.ws_connection_count.load(Ordering::Relaxed),
            lobby_subscribers: state.lobby.subscriber_count(),
        },
        worlds: WorldStats {
            configured: state.registry.world_count(),
            players: state.registry.total_players(),
        },
    })
}

/// GET /readyz — ready once at least one world is registered.
pub async fn readiness_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ready = state.registry.world_count() > 0;
    Json(serde_json::json!({
        "status": if ready { "ready" } else { "not ready: no worlds configured" },
    }))
}
