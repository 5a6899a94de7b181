use tracing_subscriber::EnvFilter;

use worldhub_server::config::ServerConfig;
use worldhub_server::{build_app, spawn_population_broadcaster};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worldhub_server=info,tower_http=warn")),
        )
        .init();

    let config = ServerConfig::load();
    config.validate();
    let listen_addr = config.listen_addr.clone();

    let (app, state) = match build_app(config) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!(error = %e, "Invalid world catalog");
            std::process::exit(1);
        },
    };

    spawn_population_broadcaster(state.clone());

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };

    tracing::info!(
        addr = %listen_addr,
        worlds = state.registry.world_count(),
        "Worldhub server listening"
    );

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
