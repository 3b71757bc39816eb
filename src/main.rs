use std::net::SocketAddr;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use meter_ledger::config::Config;
use meter_ledger::router::build_router;
use meter_ledger::startup::{
    initialize_app, persist_snapshot, shutdown_signal, spawn_background_tasks,
    stop_background_tasks,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meter_ledger=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration for environment: {}", config.environment);

    let app_state = initialize_app(&config).await?;
    let snapshot_writer = spawn_background_tasks(&app_state);

    let app = build_router(app_state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting meter ledger server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Requests have drained and the timer is gone; this is the final state
    stop_background_tasks(snapshot_writer).await;
    if let Err(e) = persist_snapshot(&app_state).await {
        error!("❌ Failed to write ledger snapshot on shutdown: {:#}", e);
        return Err(e);
    }
    info!("Meter ledger stopped");

    Ok(())
}
