use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::PeriodId;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub environment: String,
    pub current_period: PeriodId,
    pub persistence: bool,
}

/// Basic health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        current_period: state.ledger.current_period().await,
        persistence: state.snapshots.is_some(),
    })
}

/// Prometheus metrics endpoint
pub async fn get_prometheus_metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(state.metrics.render().into())
        .map_err(|_| ApiError::Internal("Failed to create response".to_string()))
}
