// Reading submission handler

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::post,
    Router,
};
use serde::Deserialize;
use tracing::info;

use super::meter_principal;
use super::response::Created;
use crate::auth::Caller;
use crate::error::Result;
use crate::models::{BlockHeight, ProofSubmission, SubmissionReceipt};
use crate::AppState;

/// Proof material plus the host block the call is made at
#[derive(Debug, Deserialize)]
pub struct SubmitReadingRequest {
    #[serde(flatten)]
    pub submission: ProofSubmission,
    pub current_block: BlockHeight,
}

/// Submit the calling meter's reading for the current period
/// POST /api/v1/submissions
pub async fn submit_reading(
    State(state): State<AppState>,
    caller: Caller,
    body: std::result::Result<Json<SubmitReadingRequest>, JsonRejection>,
) -> Result<Created<SubmissionReceipt>> {
    let meter_id = meter_principal(&caller)?;
    let Json(request) = body?;

    let receipt = state
        .ledger
        .submit_reading(&meter_id, &request.submission, request.current_block)
        .await?;
    info!(
        "Accepted reading {} from meter {} for period {}",
        receipt.reading_value, meter_id, receipt.period
    );

    Ok(Created(receipt))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(submit_reading)) // POST /api/v1/submissions
}
