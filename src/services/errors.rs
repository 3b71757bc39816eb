//! Error taxonomy shared by the ledger components.
//!
//! Every component error maps onto exactly one [`ErrorCategory`] and a stable
//! string code, so callers (and the HTTP layer) can branch on the kind of
//! failure without matching on every variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::billing::{BillError, PayError};
use super::meter_registry::RegistryError;
use super::period_manager::PeriodError;
use super::proof_ledger::ProofError;
use super::rate_table::RateError;
use super::submission_pipeline::SubmitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Caller does not hold the required authority
    Authorization,
    /// Missing meter, bill or period metadata
    NotFound,
    /// Already registered / submitted / calculated / paid, or proof reuse
    Conflict,
    /// Malformed input
    Validation,
    /// Wrong point in the period or proof lifecycle
    Temporal,
    /// Circuit mismatch, failed verification, arithmetic overflow
    Integrity,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Authorization => write!(f, "authorization"),
            ErrorCategory::NotFound => write!(f, "not_found"),
            ErrorCategory::Conflict => write!(f, "conflict"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Temporal => write!(f, "temporal"),
            ErrorCategory::Integrity => write!(f, "integrity"),
        }
    }
}

/// Implemented by every component error
pub trait Categorized {
    fn category(&self) -> ErrorCategory;

    /// Stable machine-readable code, e.g. `"PROOF_REUSED"`
    fn code(&self) -> &'static str;
}

/// Union of the component errors, returned by the ledger facade
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Rate(#[from] RateError),
    #[error(transparent)]
    Bill(#[from] BillError),
    #[error(transparent)]
    Pay(#[from] PayError),
}

impl Categorized for LedgerError {
    fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::Proof(e) => e.category(),
            LedgerError::Registry(e) => e.category(),
            LedgerError::Period(e) => e.category(),
            LedgerError::Submit(e) => e.category(),
            LedgerError::Rate(e) => e.category(),
            LedgerError::Bill(e) => e.category(),
            LedgerError::Pay(e) => e.category(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            LedgerError::Proof(e) => e.code(),
            LedgerError::Registry(e) => e.code(),
            LedgerError::Period(e) => e.code(),
            LedgerError::Submit(e) => e.code(),
            LedgerError::Rate(e) => e.code(),
            LedgerError::Bill(e) => e.code(),
            LedgerError::Pay(e) => e.code(),
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
