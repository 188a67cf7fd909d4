//! Egg Credit Service - HTTP API for egg-token balances
//!
//! This is the main entry point for the egg credit service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use egg_credit_service::{create_router, reconcile, AppState, ServiceConfig};
use egg_credit_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A .env file fills in variables not already set in the environment
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,egg_credit=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Egg Credit Service");
    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        portkey_configured = %config.portkey_url.is_some(),
        auth_enabled = %config.service_api_key.is_some(),
        thb_per_usd = %config.thb_per_usd,
        "Service configuration loaded"
    );

    let store = open_store(&config)?;

    // Build app state
    let state = AppState::new(store, config.clone())?;

    if let Some(interval) = config.reconcile_interval() {
        tracing::info!(interval = ?interval, "Starting balance reconciler");
        let _reconciler =
            reconcile::spawn(Arc::clone(&state.ledger), interval, config.reconcile_concurrency);
    }

    // Create the router
    let app = create_router(state);

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = egg_credit_store::RocksStore::open(&config.data_dir)?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "rocksdb-backend"))]
#[allow(clippy::unnecessary_wraps)]
fn open_store(_config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::warn!("Built without rocksdb-backend; balances and events are kept in memory");
    Ok(Arc::new(egg_credit_store::MemoryStore::new()))
}
