use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::debug;

use crate::auth::Caller;
use crate::error::{ApiError, ErrorCode, Result};

/// Gate a route group to callers presenting the operator key.
///
/// The ledger re-checks the authority on every admin call; this only turns
/// meter callers away before the request body is parsed.
pub async fn require_operator(
    caller: Caller,
    request: Request<Body>,
    next: Next,
) -> Result<Response> {
    if !caller.is_operator() {
        debug!(
            "Rejected {} {} from meter {}",
            request.method(),
            request.uri().path(),
            caller.principal()
        );
        return Err(ApiError::with_code(
            ErrorCode::InsufficientPermissions,
            "Operator access required",
        ));
    }

    Ok(next.run(request).await)
}
