//! Common request types and helpers shared by handlers.

use serde::Deserialize;

use crate::auth::Caller;
use crate::error::{ApiError, ErrorCode};
use crate::models::{BlockHeight, Principal};

/// Body of calls that only carry the host block height
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BlockRequest {
    pub current_block: BlockHeight,
}

/// Principal of a caller acting as a meter on its own record.
///
/// Operators act on meters through the admin routes, never as one.
pub fn meter_principal(caller: &Caller) -> Result<Principal, ApiError> {
    match caller {
        Caller::Meter(principal) => Ok(principal.clone()),
        Caller::Operator(_) => Err(ApiError::with_code(
            ErrorCode::InsufficientPermissions,
            format!(
                "This endpoint acts on the calling meter; send {} instead of an API key",
                crate::constants::headers::PRINCIPAL
            ),
        )),
    }
}
