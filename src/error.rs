use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::models::PrincipalError;
use crate::services::{Categorized, ErrorCategory, LedgerError};

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    #[serde(rename = "AUTH_1001")]
    IdentityMissing,
    #[serde(rename = "AUTH_1002")]
    InvalidApiKey,

    // Authorization errors (2xxx)
    #[serde(rename = "AUTHZ_2001")]
    InsufficientPermissions,

    // Validation errors (3xxx)
    #[serde(rename = "VAL_3001")]
    InvalidInput,
    #[serde(rename = "VAL_3002")]
    InvalidFormat,

    // Resource errors (4xxx)
    #[serde(rename = "RES_4001")]
    NotFound,
    #[serde(rename = "RES_4002")]
    Conflict,

    // Ledger rule errors (5xxx)
    #[serde(rename = "LEDGER_5001")]
    LifecycleViolation,
    #[serde(rename = "LEDGER_5002")]
    IntegrityViolation,

    // Internal errors (9xxx)
    #[serde(rename = "INT_9999")]
    InternalServerError,
}

impl ErrorCode {
    /// Get numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::IdentityMissing => 1001,
            ErrorCode::InvalidApiKey => 1002,
            ErrorCode::InsufficientPermissions => 2001,
            ErrorCode::InvalidInput => 3001,
            ErrorCode::InvalidFormat => 3002,
            ErrorCode::NotFound => 4001,
            ErrorCode::Conflict => 4002,
            ErrorCode::LifecycleViolation => 5001,
            ErrorCode::IntegrityViolation => 5002,
            ErrorCode::InternalServerError => 9999,
        }
    }

    /// Get user-friendly message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::IdentityMissing => "Caller identity required",
            ErrorCode::InvalidApiKey => "Invalid API key",
            ErrorCode::InsufficientPermissions => {
                "You don't have permission to perform this action"
            }
            ErrorCode::InvalidInput => "Invalid input provided",
            ErrorCode::InvalidFormat => "Invalid format provided",
            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::Conflict => "A conflict occurred with an existing record",
            ErrorCode::LifecycleViolation => "Operation not allowed at this point of the period",
            ErrorCode::IntegrityViolation => "Proof or arithmetic integrity check failed",
            ErrorCode::InternalServerError => "An internal server error occurred",
        }
    }

    fn for_category(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Authorization => ErrorCode::InsufficientPermissions,
            ErrorCategory::NotFound => ErrorCode::NotFound,
            ErrorCategory::Conflict => ErrorCode::Conflict,
            ErrorCategory::Validation => ErrorCode::InvalidInput,
            ErrorCategory::Temporal => ErrorCode::LifecycleViolation,
            ErrorCategory::Integrity => ErrorCode::IntegrityViolation,
        }
    }
}

/// Structured error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub request_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub code_number: u16,
    pub message: String,
    pub details: Option<String>,
    /// Ledger rule that rejected the call, e.g. `PROOF_REUSED`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Taxonomy bucket of a ledger rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{1}")]
    WithCode(ErrorCode, String),

    #[error("{1}")]
    WithCodeAndDetails(ErrorCode, String, String),
}

impl ApiError {
    /// Create error with specific error code
    pub fn with_code(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError::WithCode(code, message.into())
    }

    /// Create error with code and additional details
    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        ApiError::WithCodeAndDetails(code, message.into(), details.into())
    }

    /// Helper: Resource not found
    pub fn not_found(resource: &str) -> Self {
        ApiError::NotFound(format!("{} not found", resource))
    }

    /// Get error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::Internal(_) => ErrorCode::InternalServerError,
            ApiError::Ledger(e) => ErrorCode::for_category(e.category()),
            ApiError::WithCode(code, _) => *code,
            ApiError::WithCodeAndDetails(code, _, _) => *code,
        }
    }

    /// Get status code
    pub fn status_code(&self) -> StatusCode {
        match self.error_code() {
            ErrorCode::IdentityMissing | ErrorCode::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ErrorCode::InsufficientPermissions => StatusCode::FORBIDDEN,
            ErrorCode::InvalidInput | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict | ErrorCode::LifecycleViolation => StatusCode::CONFLICT,
            ErrorCode::IntegrityViolation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::WithCode(_, msg) | ApiError::WithCodeAndDetails(_, msg, _) => msg.clone(),
            ApiError::Ledger(e) => e.to_string(),
            ApiError::NotFound(msg) => msg.clone(),
            _ => self.error_code().message().to_string(),
        }
    }

    /// Log error with appropriate level
    fn log_error(&self, request_id: &str) {
        match self.status_code() {
            status if status.is_server_error() => {
                error!(
                    request_id = %request_id,
                    error = %self,
                    "Server error occurred"
                );
            }
            status if status.is_client_error() => {
                warn!(
                    request_id = %request_id,
                    error = %self,
                    "Client error occurred"
                );
            }
            _ => {}
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let status = self.status_code();
        let code = self.error_code();

        self.log_error(&request_id);

        let (reason, category) = match &self {
            ApiError::Ledger(e) => (Some(e.code().to_string()), Some(e.category())),
            _ => (None, None),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code,
                code_number: code.code(),
                message: self.message(),
                details: match &self {
                    ApiError::WithCodeAndDetails(_, _, details) => Some(details.clone()),
                    _ => None,
                },
                reason,
                category,
            },
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<PrincipalError> for ApiError {
    fn from(e: PrincipalError) -> Self {
        ApiError::with_details(ErrorCode::InvalidInput, "Invalid principal", e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        match err {
            JsonRejection::JsonDataError(e) => ApiError::with_details(
                ErrorCode::InvalidInput,
                "Invalid input provided",
                e.body_text(),
            ),
            JsonRejection::JsonSyntaxError(_) => {
                ApiError::with_code(ErrorCode::InvalidFormat, "Invalid JSON format")
            }
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::with_code(ErrorCode::InvalidFormat, "JSON content type required")
            }
            _ => ApiError::with_details(
                ErrorCode::InvalidInput,
                "Invalid request body",
                err.body_text(),
            ),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(err: PathRejection) -> Self {
        ApiError::with_details(ErrorCode::InvalidFormat, "Invalid path parameter", err.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        ApiError::with_details(ErrorCode::InvalidFormat, "Invalid query string", err.body_text())
    }
}
