//! Outflow Service - HTTP API for credits, campaigns, and dispatch.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use outflow_service::{create_router, tasks, AppState, LocalMailProvider, ServiceConfig};
use outflow_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,outflow=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Outflow Service");

    let config = ServiceConfig::from_env();
    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        daily_send_cap = %config.dispatch.daily_send_cap,
        dispatch_interval_seconds = %config.dispatch_interval_seconds,
        "Service configuration loaded"
    );

    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&config.data_dir)?);

    let state = AppState::new(store, config.clone(), Arc::new(LocalMailProvider));

    tasks::spawn_dispatch_loop(Arc::new(state.clone()));
    tracing::info!("Background dispatch loop started");

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    axum::serve(listener, app).await?;

    Ok(())
}
