use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use super::response::ApiResponse;
use crate::error::{ApiError, ErrorCode, Result};
use crate::models::{BlockHeight, ProofHash, ProofRecord};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProofQuery {
    pub block: BlockHeight,
}

#[derive(Debug, Serialize)]
pub struct ProofStatusResponse {
    pub proof_hash: ProofHash,
    /// Recorded and still inside the validity window at `block`
    pub verified: bool,
    pub block: BlockHeight,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ProofRecord>,
}

/// GET /api/v1/proofs/{hash}?block=
pub async fn get_proof_status(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
    query: std::result::Result<Query<ProofQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<ProofStatusResponse>>> {
    let Path(hash) = path?;
    let Query(query) = query?;
    let proof_hash = ProofHash::from_hex(&hash).map_err(|e| {
        ApiError::with_details(ErrorCode::InvalidFormat, "Invalid proof hash", e.to_string())
    })?;

    let verified = state
        .ledger
        .is_proof_verified(&proof_hash, query.block)
        .await;
    let record = state.ledger.proof_record(&proof_hash).await;

    Ok(Json(ApiResponse::success(ProofStatusResponse {
        proof_hash,
        verified,
        block: query.block,
        record,
    })))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/{hash}", get(get_proof_status))
}
