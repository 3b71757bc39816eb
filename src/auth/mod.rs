//! Caller identity resolution.
//!
//! The ledger only needs to know *who* is calling: the operator (holding the
//! configured authority) or a meter. Cryptographic meter authentication lives
//! in the external registry; here a meter names itself via
//! `X-Ledger-Principal` and the operator proves itself with `X-API-Key`.

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};

use crate::constants::headers;
use crate::error::{ApiError, ErrorCode};
use crate::models::Principal;
use crate::AppState;

pub mod middleware;

pub use middleware::require_operator;

/// Resolved identity of the caller of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Presented the operator API key; acts as the ledger authority
    Operator(Principal),
    Meter(Principal),
}

impl Caller {
    pub fn principal(&self) -> &Principal {
        match self {
            Caller::Operator(principal) | Caller::Meter(principal) => principal,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Caller::Operator(_))
    }

    /// Resolve the caller from request headers.
    ///
    /// A present but wrong API key is rejected outright instead of falling
    /// through to the principal header.
    pub fn resolve(
        headers: &HeaderMap,
        operator_api_key: &str,
        authority: &Principal,
    ) -> Result<Self, ApiError> {
        if let Some(api_key) = headers.get(headers::API_KEY) {
            let api_key = api_key
                .to_str()
                .map_err(|_| ApiError::with_code(ErrorCode::InvalidApiKey, "Invalid API key"))?;
            if api_key != operator_api_key {
                return Err(ApiError::with_code(
                    ErrorCode::InvalidApiKey,
                    "Invalid API key",
                ));
            }
            return Ok(Caller::Operator(authority.clone()));
        }

        let value = headers
            .get(headers::PRINCIPAL)
            .ok_or_else(|| {
                ApiError::with_code(
                    ErrorCode::IdentityMissing,
                    format!(
                        "Provide {} or {} to identify the caller",
                        headers::API_KEY,
                        headers::PRINCIPAL
                    ),
                )
            })?
            .to_str()
            .map_err(|_| {
                ApiError::with_code(ErrorCode::InvalidFormat, "Principal header is not valid text")
            })?;

        let principal: Principal = value.parse()?;
        if &principal == authority {
            return Err(ApiError::with_code(
                ErrorCode::InsufficientPermissions,
                "The authority identity requires the operator API key",
            ));
        }
        Ok(Caller::Meter(principal))
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(caller) = parts.extensions.get::<Caller>() {
            return Ok(caller.clone());
        }

        let caller = Caller::resolve(
            &parts.headers,
            &state.config.operator_api_key,
            &state.config.authority,
        )?;
        parts.extensions.insert(caller.clone());
        Ok(caller)
    }
}
