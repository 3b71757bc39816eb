// Billing period API Handlers
// Read-only views of the period clock and per-period totals

use axum::{
    extract::{rejection::PathRejection, Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;

use super::response::ApiResponse;
use crate::error::{ApiError, Result};
use crate::models::{Period, PeriodId, PeriodTotals};
use crate::AppState;

/// Current period response
#[derive(Debug, Serialize)]
pub struct CurrentPeriodResponse {
    pub period: PeriodId,
    /// Absent only when the period was restored without metadata
    pub metadata: Option<Period>,
}

/// GET /api/v1/periods/current
pub async fn get_current_period(
    State(state): State<AppState>,
) -> Json<ApiResponse<CurrentPeriodResponse>> {
    let (period, metadata) = state.ledger.current_period_with_metadata().await;
    Json(ApiResponse::success(CurrentPeriodResponse { period, metadata }))
}

/// GET /api/v1/periods/{period}
pub async fn get_period(
    State(state): State<AppState>,
    path: std::result::Result<Path<PeriodId>, PathRejection>,
) -> Result<Json<ApiResponse<Period>>> {
    let Path(id) = path?;
    let period = state
        .ledger
        .period(id)
        .await
        .ok_or_else(|| ApiError::not_found(&format!("Period {}", id)))?;
    Ok(Json(ApiResponse::success(period)))
}

/// Totals of a period with no bills read as zero
/// GET /api/v1/periods/{period}/totals
pub async fn get_period_totals(
    State(state): State<AppState>,
    path: std::result::Result<Path<PeriodId>, PathRejection>,
) -> Result<Json<ApiResponse<PeriodTotals>>> {
    let Path(id) = path?;
    let totals = state.ledger.period_totals(id).await.unwrap_or_default();
    Ok(Json(ApiResponse::success(totals)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/current", get(get_current_period))
        .route("/{period}", get(get_period))
        .route("/{period}/totals", get(get_period_totals))
}
