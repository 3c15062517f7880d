mod http;

use anyhow::Context;
use fleet_sync::config::HostConfig;
use fleet_sync::connection::ConnectionManager;
use fleet_sync::transport::StompTransport;
use http::router::create_router;
use http::state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = fleet_sync::SERVICE_VERSION, "Starting Fleet Sync service");

    let config = HostConfig::from_env().context("reading FLEET_SYNC_* configuration")?;

    let manager = ConnectionManager::new(StompTransport::new(config.stomp.clone()), config.sync.clone());
    manager.activate()?;

    let state = AppState::new(
        manager.subscriber(),
        manager.state_changes(),
        Arc::clone(manager.metrics()),
    );
    let app = create_router(state);

    let listener = TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("binding {}", config.http_addr))?;

    tracing::info!("Listening on {}", config.http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = manager.deactivate().await {
        tracing::error!(error = %e, "Teardown did not complete cleanly");
    }
    tracing::info!("Fleet Sync service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
