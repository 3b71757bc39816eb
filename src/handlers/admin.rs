// Operator API Handlers
// Every route here sits behind `require_operator`; the ledger additionally
// checks the resolved principal against each component's authority.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    response::Json,
    routing::{post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::response::ApiResponse;
use super::BlockRequest;
use crate::auth::Caller;
use crate::error::{ApiError, ErrorCode, Result};
use crate::models::{PeriodId, Principal, SettlementId};
use crate::services::{PeriodParams, ProofParams};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub closed_period: PeriodId,
    pub current_period: PeriodId,
}

#[derive(Debug, Deserialize)]
pub struct PeriodParamsRequest {
    pub period_duration: Option<u64>,
    pub max_reading_delta: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ProofParamsRequest {
    pub circuit_id: Option<u32>,
    pub max_proof_age: Option<u64>,
    pub proof_validity_period: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rate: u64,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_id: Option<SettlementId>,
    pub rate: u64,
}

#[derive(Debug, Deserialize)]
pub struct PublicKeyRequest {
    #[serde(with = "crate::models::hex_bytes")]
    pub public_key: Vec<u8>,
}

/// Close the current period and open the next
/// POST /api/v1/admin/periods/advance
pub async fn advance_period(
    State(state): State<AppState>,
    caller: Caller,
    body: std::result::Result<Json<BlockRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AdvanceResponse>>> {
    let Json(request) = body?;
    let current_period = state
        .ledger
        .advance_period(caller.principal(), request.current_block)
        .await?;
    info!(
        "Period {} closed at block {}, period {} open",
        current_period - 1,
        request.current_block,
        current_period
    );
    Ok(Json(ApiResponse::success(AdvanceResponse {
        closed_period: current_period - 1,
        current_period,
    })))
}

/// POST /api/v1/admin/periods/pause
pub async fn pause_period(
    State(state): State<AppState>,
    caller: Caller,
    body: std::result::Result<Json<BlockRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>> {
    let Json(request) = body?;
    state
        .ledger
        .pause_period(caller.principal(), request.current_block)
        .await?;
    warn!("Period paused at block {}", request.current_block);
    Ok(Json(ApiResponse::message("Period paused")))
}

/// PUT /api/v1/admin/periods/params
pub async fn update_period_params(
    State(state): State<AppState>,
    caller: Caller,
    body: std::result::Result<Json<PeriodParamsRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<PeriodParams>>> {
    let Json(request) = body?;
    if request.period_duration.is_none() && request.max_reading_delta.is_none() {
        return Err(ApiError::with_code(
            ErrorCode::InvalidInput,
            "Provide period_duration and/or max_reading_delta",
        ));
    }

    let params = state
        .ledger
        .update_period_params(
            caller.principal(),
            request.period_duration,
            request.max_reading_delta,
        )
        .await?;
    info!(?params, "Period parameters updated");
    Ok(Json(ApiResponse::success(params)))
}

/// PUT /api/v1/admin/proofs/params
pub async fn update_proof_params(
    State(state): State<AppState>,
    caller: Caller,
    body: std::result::Result<Json<ProofParamsRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ProofParams>>> {
    let Json(request) = body?;
    if request.circuit_id.is_none()
        && request.max_proof_age.is_none()
        && request.proof_validity_period.is_none()
    {
        return Err(ApiError::with_code(
            ErrorCode::InvalidInput,
            "No proof parameter provided",
        ));
    }

    let params = state
        .ledger
        .update_proof_params(
            caller.principal(),
            request.circuit_id,
            request.max_proof_age,
            request.proof_validity_period,
        )
        .await?;
    info!(?params, "Proof parameters updated");
    Ok(Json(ApiResponse::success(params)))
}

/// PUT /api/v1/admin/rates/global
pub async fn set_global_rate(
    State(state): State<AppState>,
    caller: Caller,
    body: std::result::Result<Json<RateRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RateResponse>>> {
    let Json(request) = body?;
    state
        .ledger
        .set_global_rate(caller.principal(), request.rate)
        .await?;
    info!("Global rate set to {}", request.rate);
    Ok(Json(ApiResponse::success(RateResponse {
        settlement_id: None,
        rate: request.rate,
    })))
}

/// PUT /api/v1/admin/rates/{settlement}
pub async fn set_settlement_rate(
    State(state): State<AppState>,
    caller: Caller,
    path: std::result::Result<Path<SettlementId>, PathRejection>,
    body: std::result::Result<Json<RateRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RateResponse>>> {
    let Path(settlement_id) = path?;
    let Json(request) = body?;
    state
        .ledger
        .set_settlement_rate(caller.principal(), settlement_id, request.rate)
        .await?;
    info!("Settlement {} rate set to {}", settlement_id, request.rate);
    Ok(Json(ApiResponse::success(RateResponse {
        settlement_id: Some(settlement_id),
        rate: request.rate,
    })))
}

/// Drop a settlement override so it falls back to the global rate
/// DELETE /api/v1/admin/rates/{settlement}
pub async fn remove_settlement_rate(
    State(state): State<AppState>,
    caller: Caller,
    path: std::result::Result<Path<SettlementId>, PathRejection>,
) -> Result<Json<ApiResponse<()>>> {
    let Path(settlement_id) = path?;
    let removed = state
        .ledger
        .remove_settlement_rate(caller.principal(), settlement_id)
        .await?;
    let message = match removed {
        Some(rate) => format!("Removed rate {} of settlement {}", rate, settlement_id),
        None => format!("Settlement {} had no rate override", settlement_id),
    };
    Ok(Json(ApiResponse::message(message)))
}

/// PUT /api/v1/admin/keys/{meter}
pub async fn register_public_key(
    State(state): State<AppState>,
    caller: Caller,
    path: std::result::Result<Path<Principal>, PathRejection>,
    body: std::result::Result<Json<PublicKeyRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>> {
    let Path(meter_id) = path?;
    let Json(request) = body?;
    state
        .ledger
        .register_public_key(caller.principal(), &meter_id, request.public_key)
        .await?;
    info!("Public key registered for {}", meter_id);
    Ok(Json(ApiResponse::message(format!(
        "Public key registered for {}",
        meter_id
    ))))
}

/// POST /api/v1/admin/bills/{meter}/{period}/paid
pub async fn mark_paid(
    State(state): State<AppState>,
    caller: Caller,
    path: std::result::Result<Path<(Principal, PeriodId)>, PathRejection>,
) -> Result<Json<ApiResponse<()>>> {
    let Path((meter_id, period)) = path?;
    state
        .ledger
        .mark_paid(caller.principal(), &meter_id, period)
        .await?;
    info!("Bill of {} for period {} marked paid", meter_id, period);
    Ok(Json(ApiResponse::message(format!(
        "Bill of {} for period {} marked paid",
        meter_id, period
    ))))
}

/// Build operator routes; the caller gate is applied by the router
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/periods/advance", post(advance_period))
        .route("/periods/pause", post(pause_period))
        .route("/periods/params", put(update_period_params))
        .route("/proofs/params", put(update_proof_params))
        .route("/rates/global", put(set_global_rate))
        .route(
            "/rates/{settlement}",
            put(set_settlement_rate).delete(remove_settlement_rate),
        )
        .route("/keys/{meter}", put(register_public_key))
        .route("/bills/{meter}/{period}/paid", post(mark_paid))
}
