// Meter API Handlers
// Registration lifecycle of the calling meter plus public meter lookups

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

use super::meter_principal;
use super::response::{ApiResponse, Created, ListResponse, ResponseMeta};
use crate::auth::Caller;
use crate::error::{ApiError, ErrorCode, Result};
use crate::models::{Bill, BlockHeight, Meter, PeriodId, Principal, SettlementId, Submission};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterMeterRequest {
    pub settlement_id: SettlementId,
    pub current_block: BlockHeight,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub meter_id: Principal,
    pub up_to_period: PeriodId,
    pub outstanding: u64,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    /// Defaults to the current period
    pub up_to: Option<PeriodId>,
}

/// Register the calling meter
/// POST /api/v1/meters
pub async fn register_meter(
    State(state): State<AppState>,
    caller: Caller,
    body: std::result::Result<Json<RegisterMeterRequest>, JsonRejection>,
) -> Result<Created<Meter>> {
    let meter_id = meter_principal(&caller)?;
    let Json(request) = body?;

    state
        .ledger
        .register_meter(&meter_id, request.settlement_id, request.current_block)
        .await?;
    info!(
        "Meter {} registered in settlement {}",
        meter_id, request.settlement_id
    );

    let meter = state
        .ledger
        .meter(&meter_id)
        .await
        .ok_or_else(|| ApiError::Internal("Registered meter vanished".to_string()))?;
    Ok(Created(meter))
}

/// Deregister the calling meter; a meter may only remove itself
/// DELETE /api/v1/meters/{meter}
pub async fn deregister_meter(
    State(state): State<AppState>,
    caller: Caller,
    path: std::result::Result<Path<Principal>, PathRejection>,
) -> Result<Json<ApiResponse<()>>> {
    let meter_id = meter_principal(&caller)?;
    let Path(target) = path?;
    if target != meter_id {
        return Err(ApiError::with_code(
            ErrorCode::InsufficientPermissions,
            "Meters can only deregister themselves",
        ));
    }
    state.ledger.deregister_meter(&meter_id).await?;
    info!("Meter {} deregistered", meter_id);
    Ok(Json(ApiResponse::message(format!(
        "Meter {} deregistered",
        meter_id
    ))))
}

/// GET /api/v1/meters/{meter}
pub async fn get_meter(
    State(state): State<AppState>,
    path: std::result::Result<Path<Principal>, PathRejection>,
) -> Result<Json<ApiResponse<Meter>>> {
    let Path(meter_id) = path?;
    let meter = state
        .ledger
        .meter(&meter_id)
        .await
        .ok_or_else(|| ApiError::not_found(&format!("Meter {}", meter_id)))?;
    Ok(Json(ApiResponse::success(meter)))
}

/// GET /api/v1/meters/{meter}/submissions/{period}
pub async fn get_submission(
    State(state): State<AppState>,
    path: std::result::Result<Path<(Principal, PeriodId)>, PathRejection>,
) -> Result<Json<ApiResponse<Submission>>> {
    let Path((meter_id, period)) = path?;
    let submission = state
        .ledger
        .submission(&meter_id, period)
        .await
        .ok_or_else(|| {
            ApiError::not_found(&format!("Submission of {} for period {}", meter_id, period))
        })?;
    Ok(Json(ApiResponse::success(submission)))
}

/// GET /api/v1/meters/{meter}/bills
pub async fn list_bills(
    State(state): State<AppState>,
    path: std::result::Result<Path<Principal>, PathRejection>,
) -> Result<Json<ApiResponse<ListResponse<Bill>>>> {
    let Path(meter_id) = path?;
    let bills = state.ledger.bills_for_meter(&meter_id).await;
    let total = bills.len() as u64;
    Ok(Json(
        ApiResponse::success(ListResponse::new(bills)).with_meta(ResponseMeta {
            total: Some(total),
            current_period: Some(state.ledger.current_period().await),
        }),
    ))
}

/// Sum of unpaid bills up to a period
/// GET /api/v1/meters/{meter}/balance?up_to=
pub async fn get_balance(
    State(state): State<AppState>,
    path: std::result::Result<Path<Principal>, PathRejection>,
    query: std::result::Result<Query<BalanceQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<BalanceResponse>>> {
    let Path(meter_id) = path?;
    let Query(query) = query?;
    let up_to_period = match query.up_to {
        Some(period) => period,
        None => state.ledger.current_period().await,
    };

    let outstanding = state
        .ledger
        .outstanding_balance(&meter_id, up_to_period)
        .await?;
    Ok(Json(ApiResponse::success(BalanceResponse {
        meter_id,
        up_to_period,
        outstanding,
    })))
}

/// Build meter routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(register_meter)) // POST /api/v1/meters
        .route("/{meter}", get(get_meter).delete(deregister_meter))
        .route("/{meter}/submissions/{period}", get(get_submission))
        .route("/{meter}/bills", get(list_bills))
        .route("/{meter}/balance", get(get_balance))
}
