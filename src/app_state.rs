//! Application state shared across all handlers.

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::services::LedgerService;
use crate::storage::SnapshotStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Serialized access to the ledger
    pub ledger: LedgerService,
    /// Renders the Prometheus exposition for `/metrics`
    pub metrics: PrometheusHandle,
    /// Snapshot file, when persistence is configured
    pub snapshots: Option<SnapshotStore>,
}

impl axum::extract::FromRef<AppState> for LedgerService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ledger.clone()
    }
}
