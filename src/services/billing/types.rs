use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    Bill, BillAmount, MeterInfo, PeriodId, PeriodStatus, PeriodTotals, Principal, ResolvedRate,
    SettlementId, SubmissionView,
};
use crate::services::errors::{Categorized, ErrorCategory};

/// Meter lookup consumed by billing
pub trait MeterDirectory {
    fn get_meter_info(&self, meter_id: &Principal) -> Option<MeterInfo>;
}

/// Period status lookup consumed by billing
pub trait PeriodStatusSource {
    fn get_period_status(&self, period: PeriodId) -> Option<PeriodStatus>;
}

/// Submission lookup consumed by billing
pub trait SubmissionSource {
    fn get_submission(&self, meter_id: &Principal, period: PeriodId) -> Option<SubmissionView>;
}

/// Tariff lookup consumed by billing
pub trait RateResolver {
    fn resolve_rate(&self, settlement_id: SettlementId) -> ResolvedRate;
}

/// Read-only collaborators for one billing call
#[derive(Clone, Copy)]
pub struct BillingInputs<'a> {
    pub meters: &'a dyn MeterDirectory,
    pub periods: &'a dyn PeriodStatusSource,
    pub submissions: &'a dyn SubmissionSource,
    pub rates: &'a dyn RateResolver,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillError {
    #[error("meter {0} is not registered")]
    MeterNotRegistered(Principal),
    #[error("bill for meter {meter} in period {period} already calculated")]
    AlreadyCalculated { meter: Principal, period: PeriodId },
    #[error("period {period} is not closed")]
    PeriodNotClosed {
        period: PeriodId,
        status: Option<PeriodStatus>,
    },
    #[error("no usage recorded for meter {meter} in period {period}")]
    ZeroUsage { meter: Principal, period: PeriodId },
    #[error("no rate available for settlement {0}")]
    RateNotSet(SettlementId),
    #[error("billing arithmetic overflow")]
    Overflow,
}

impl Categorized for BillError {
    fn category(&self) -> ErrorCategory {
        match self {
            BillError::MeterNotRegistered(_) | BillError::RateNotSet(_) => ErrorCategory::NotFound,
            BillError::AlreadyCalculated { .. } => ErrorCategory::Conflict,
            BillError::PeriodNotClosed { .. } => ErrorCategory::Temporal,
            BillError::ZeroUsage { .. } => ErrorCategory::Validation,
            BillError::Overflow => ErrorCategory::Integrity,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            BillError::MeterNotRegistered(_) => "METER_NOT_REGISTERED",
            BillError::AlreadyCalculated { .. } => "ALREADY_CALCULATED",
            BillError::PeriodNotClosed { .. } => "PERIOD_NOT_CLOSED",
            BillError::ZeroUsage { .. } => "ZERO_USAGE",
            BillError::RateNotSet(_) => "RATE_NOT_SET",
            BillError::Overflow => "OVERFLOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayError {
    #[error("caller is not the billing authority")]
    Unauthorized,
    #[error("no bill for meter {meter} in period {period}")]
    BillNotFound { meter: Principal, period: PeriodId },
    #[error("bill for meter {meter} in period {period} is already paid")]
    AlreadyPaid { meter: Principal, period: PeriodId },
}

impl Categorized for PayError {
    fn category(&self) -> ErrorCategory {
        match self {
            PayError::Unauthorized => ErrorCategory::Authorization,
            PayError::BillNotFound { .. } => ErrorCategory::NotFound,
            PayError::AlreadyPaid { .. } => ErrorCategory::Conflict,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            PayError::Unauthorized => "UNAUTHORIZED",
            PayError::BillNotFound { .. } => "BILL_NOT_FOUND",
            PayError::AlreadyPaid { .. } => "ALREADY_PAID",
        }
    }
}

/// Stored totals that disagree with the bills they summarize
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("period {0} totals do not match its bills")]
    PeriodTotals(PeriodId),
    #[error("settlement {0} totals for period {1} do not match its bills")]
    SettlementTotals(SettlementId, PeriodId),
    #[error("duplicate bill for meter {0} in period {1}")]
    DuplicateBill(Principal, PeriodId),
    #[error("totals overflow while reconciling")]
    Overflow,
}

/// Per-meter results of a batch calculation. Successes persist regardless
/// of later failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub results: Vec<(Principal, Result<BillAmount, BillError>)>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSnapshot {
    pub bills: Vec<Bill>,
    pub period_totals: Vec<(PeriodId, PeriodTotals)>,
    pub settlement_totals: Vec<(SettlementId, PeriodId, PeriodTotals)>,
}
