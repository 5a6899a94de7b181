pub mod api;
pub mod config;
pub mod health;
pub mod lobby;
pub mod registry;
pub mod room;
pub mod state;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the router and shared state from configuration.
pub fn build_app(config: ServerConfig) -> Result<(Router, AppState), registry::RegistryError> {
    let state = AppState::new(config)?;

    let api = Router::new()
        .route("/worlds", get(api::get_worlds));

    let app = Router::new()
        .route("/lobby", get(ws::lobby_ws_handler))
        .route("/worlds/{world}", get(ws::world_ws_handler))
        .nest("/api/v1", api)
        .route("/healthz", get(health::health_check))
        .route("/readyz", get(health::readiness_check))
        .layer(CorsLayer::permissive())
        .fallback_service(ServeDir::new(state.config.web_root.clone()))
        .with_state(state.clone());

    Ok((app, state))
}

/// Bridge membership-change notices to lobby subscribers. Each notice
/// triggers a fresh full snapshot, so a lagged receiver loses nothing but
/// intermediate states it would have overwritten anyway.
pub fn spawn_population_broadcaster(state: AppState) -> tokio::task::JoinHandle<()> {
    let mut changes = state.changes.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(world_id) => {
                    tracing::debug!(world = %world_id, "Pushing population update");
                    state.lobby.push_update(state.registry.snapshot());
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Population broadcaster lagged");
                    state.lobby.push_update(state.registry.snapshot());
                },
                Err(RecvError::Closed) => break,
            }
        }
    })
}
