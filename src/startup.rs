//! Application startup and shutdown logic.

use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::config::Config;
use crate::services::proof_ledger::VerifierKind;
use crate::services::{Authorities, Ledger, LedgerService};
use crate::storage::SnapshotStore;

/// Initialize the ledger and create the AppState.
///
/// Installs the global Prometheus recorder, so call this once per process.
pub async fn initialize_app(config: &Config) -> Result<AppState> {
    info!("🚀 Starting meter ledger ({})", config.environment);

    if config.is_production() && config.ledger.verifier == VerifierKind::Permissive {
        anyhow::bail!("Permissive proof verifier is not allowed in production");
    }

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
    info!("✅ Prometheus metrics initialized");

    let snapshots = config.snapshot_path.clone().map(SnapshotStore::new);
    let ledger = load_ledger(config, snapshots.as_ref()).await?;

    Ok(build_state(config.clone(), ledger, metrics_handle, snapshots))
}

/// Assemble the AppState around an already built ledger
pub fn build_state(
    config: Config,
    ledger: Ledger,
    metrics: PrometheusHandle,
    snapshots: Option<SnapshotStore>,
) -> AppState {
    AppState {
        config,
        ledger: LedgerService::new(ledger),
        metrics,
        snapshots,
    }
}

async fn load_ledger(config: &Config, snapshots: Option<&SnapshotStore>) -> Result<Ledger> {
    let authorities = Authorities::single(config.authority.clone());

    let Some(store) = snapshots else {
        warn!("⚠️  LEDGER_SNAPSHOT_PATH not set, ledger state lives in memory only");
        return Ok(Ledger::new(&config.ledger, authorities)?);
    };

    match store.load().await? {
        Some(snapshot) => {
            let ledger = Ledger::restore(&config.ledger, authorities, snapshot)
                .with_context(|| format!("restoring {}", store.path().display()))?;
            info!(
                "✅ Ledger restored at period {}",
                ledger.current_period()
            );
            Ok(ledger)
        }
        None => Ok(Ledger::new(&config.ledger, authorities)?),
    }
}

/// Write the current ledger state, if persistence is configured
pub async fn persist_snapshot(app_state: &AppState) -> Result<()> {
    let Some(store) = &app_state.snapshots else {
        return Ok(());
    };
    let snapshot = app_state.ledger.snapshot().await;
    store.save(&snapshot).await
}

/// Spawn background tasks.
///
/// Returns the snapshot writer's handle; stop it with [`stop_background_tasks`]
/// before the final save.
pub fn spawn_background_tasks(app_state: &AppState) -> Option<JoinHandle<()>> {
    let interval_secs = app_state.config.snapshot_interval_secs;
    if app_state.snapshots.is_none() || interval_secs == 0 {
        return None;
    }

    let state = app_state.clone();
    Some(tokio::spawn(async move {
        info!("🚀 Starting snapshot writer (interval: {}s)", interval_secs);
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = persist_snapshot(&state).await {
                error!("❌ Error writing ledger snapshot: {:#}", e);
            }
        }
    }))
}

/// Abort the snapshot writer and wait until it has exited
pub async fn stop_background_tasks(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else {
        return;
    };
    handle.abort();
    match handle.await {
        Err(e) if e.is_panic() => error!("❌ Snapshot writer panicked: {}", e),
        _ => info!("Snapshot writer stopped"),
    }
}

/// Wait for shutdown signal.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully");
        },
    }
}
