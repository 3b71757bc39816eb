// Billing API Handlers
// Bill calculation is open to any caller; marking bills paid lives under /admin

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::response::{ApiResponse, Created};
use super::BlockRequest;
use crate::error::{ApiError, ErrorCode, Result};
use crate::models::{
    Bill, BillAmount, BlockHeight, PeriodId, Principal, SettlementId, SettlementSummary,
};
use crate::services::{BatchOutcome, Categorized, ErrorCategory};
use crate::AppState;

/// Largest batch accepted in one request
pub const MAX_BATCH_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
pub struct BatchBillRequest {
    pub meter_ids: Vec<Principal>,
    pub period: PeriodId,
    pub current_block: BlockHeight,
}

/// Per-meter outcome inside a batch
#[derive(Debug, Serialize)]
pub struct BatchBillItem {
    pub meter_id: Principal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill: Option<BillAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchBillError>,
}

#[derive(Debug, Serialize)]
pub struct BatchBillError {
    pub reason: &'static str,
    pub category: ErrorCategory,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BatchBillResponse {
    pub period: PeriodId,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchBillItem>,
}

impl BatchBillResponse {
    fn new(period: PeriodId, outcome: BatchOutcome) -> Self {
        let results = outcome
            .results
            .into_iter()
            .map(|(meter_id, result)| match result {
                Ok(amount) => BatchBillItem {
                    meter_id,
                    bill: Some(amount),
                    error: None,
                },
                Err(e) => BatchBillItem {
                    meter_id,
                    bill: None,
                    error: Some(BatchBillError {
                        reason: e.code(),
                        category: e.category(),
                        message: e.to_string(),
                    }),
                },
            })
            .collect();

        Self {
            period,
            succeeded: outcome.succeeded,
            failed: outcome.failed,
            results,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Defaults to the current period
    pub period: Option<PeriodId>,
}

/// Calculate the bill of one meter for a closed period
/// POST /api/v1/bills/{meter}/{period}
pub async fn calculate_bill(
    State(state): State<AppState>,
    path: std::result::Result<Path<(Principal, PeriodId)>, PathRejection>,
    body: std::result::Result<Json<BlockRequest>, JsonRejection>,
) -> Result<Created<BillAmount>> {
    let Path((meter_id, period)) = path?;
    let Json(request) = body?;

    let amount = state
        .ledger
        .calculate_bill(&meter_id, period, request.current_block)
        .await?;
    info!(
        "Billed meter {} for period {}: usage {} amount {}",
        meter_id, period, amount.usage, amount.amount
    );
    Ok(Created(amount))
}

/// Calculate bills for many meters; one failure does not stop the rest
/// POST /api/v1/bills/batch
pub async fn batch_calculate(
    State(state): State<AppState>,
    body: std::result::Result<Json<BatchBillRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<BatchBillResponse>>> {
    let Json(request) = body?;
    if request.meter_ids.is_empty() {
        return Err(ApiError::with_code(
            ErrorCode::InvalidInput,
            "meter_ids must not be empty",
        ));
    }
    if request.meter_ids.len() > MAX_BATCH_SIZE {
        return Err(ApiError::with_details(
            ErrorCode::InvalidInput,
            "Batch too large",
            format!(
                "{} meters requested, at most {} allowed",
                request.meter_ids.len(),
                MAX_BATCH_SIZE
            ),
        ));
    }

    let outcome = state
        .ledger
        .batch_calculate(&request.meter_ids, request.period, request.current_block)
        .await;
    Ok(Json(ApiResponse::success(BatchBillResponse::new(
        request.period,
        outcome,
    ))))
}

/// GET /api/v1/bills/{meter}/{period}
pub async fn get_bill(
    State(state): State<AppState>,
    path: std::result::Result<Path<(Principal, PeriodId)>, PathRejection>,
) -> Result<Json<ApiResponse<Bill>>> {
    let Path((meter_id, period)) = path?;
    let bill = state
        .ledger
        .get_bill(&meter_id, period)
        .await
        .ok_or_else(|| ApiError::not_found(&format!("Bill of {} for period {}", meter_id, period)))?;
    Ok(Json(ApiResponse::success(bill)))
}

/// GET /api/v1/settlements/{id}/summary?period=
pub async fn settlement_summary(
    State(state): State<AppState>,
    path: std::result::Result<Path<SettlementId>, PathRejection>,
    query: std::result::Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<SettlementSummary>>> {
    let Path(settlement_id) = path?;
    let Query(query) = query?;
    let period = match query.period {
        Some(period) => period,
        None => state.ledger.current_period().await,
    };

    let summary = state.ledger.settlement_summary(settlement_id, period).await;
    Ok(Json(ApiResponse::success(summary)))
}

pub fn bill_routes() -> Router<AppState> {
    Router::new()
        .route("/batch", post(batch_calculate)) // POST /api/v1/bills/batch
        .route("/{meter}/{period}", post(calculate_bill).get(get_bill))
}

pub fn settlement_routes() -> Router<AppState> {
    Router::new().route("/{id}/summary", get(settlement_summary))
}
