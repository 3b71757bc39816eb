//! Reading submission: the only writer of `Submission` records.
//!
//! A submission touches the registry, the period counters and the proof
//! ledger. Every check runs before the first write so that a rejected
//! submission leaves all three untouched.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{
    BlockHeight, PeriodId, Principal, ProofHash, ProofSubmission, Submission, SubmissionView,
};
use crate::services::billing::SubmissionSource;
use crate::services::errors::{Categorized, ErrorCategory};
use crate::services::meter_registry::MeterRegistry;
use crate::services::period_manager::PeriodManager;
use crate::services::proof_ledger::{ProofError, ProofLedger};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("meter {0} is not registered")]
    MeterNotRegistered(Principal),
    #[error("period {0} is not accepting submissions")]
    PeriodClosed(PeriodId),
    #[error("meter {meter} already submitted for period {period}")]
    AlreadySubmitted { meter: Principal, period: PeriodId },
    #[error("reading {submitted} out of range (last {last}, max delta {max_delta})")]
    ReadingOutOfRange {
        last: u64,
        submitted: u64,
        max_delta: u64,
    },
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error("period submission counter overflow")]
    Overflow,
}

impl Categorized for SubmitError {
    fn category(&self) -> ErrorCategory {
        match self {
            SubmitError::MeterNotRegistered(_) => ErrorCategory::NotFound,
            SubmitError::PeriodClosed(_) => ErrorCategory::Temporal,
            SubmitError::AlreadySubmitted { .. } => ErrorCategory::Conflict,
            SubmitError::ReadingOutOfRange { .. } => ErrorCategory::Validation,
            SubmitError::Proof(e) => e.category(),
            SubmitError::Overflow => ErrorCategory::Integrity,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            SubmitError::MeterNotRegistered(_) => "METER_NOT_REGISTERED",
            SubmitError::PeriodClosed(_) => "PERIOD_CLOSED",
            SubmitError::AlreadySubmitted { .. } => "ALREADY_SUBMITTED",
            SubmitError::ReadingOutOfRange { .. } => "READING_OUT_OF_RANGE",
            SubmitError::Proof(e) => e.code(),
            SubmitError::Overflow => "OVERFLOW",
        }
    }
}

/// Components a submission reads and writes
pub struct SubmitContext<'a> {
    pub registry: &'a mut MeterRegistry,
    pub periods: &'a mut PeriodManager,
    pub proofs: &'a mut ProofLedger,
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionPipeline {
    submissions: BTreeMap<(Principal, PeriodId), Submission>,
}

impl SubmissionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts one verified reading for `(meter_id, period)`.
    ///
    /// Checks run in order: active meter, active period, no prior
    /// submission, reading range, proof. Proof errors pass through unchanged.
    pub fn submit(
        &mut self,
        ctx: SubmitContext<'_>,
        meter_id: &Principal,
        period: PeriodId,
        submission: &ProofSubmission,
        current_block: BlockHeight,
    ) -> Result<ProofHash, SubmitError> {
        let meter = ctx
            .registry
            .validate_active(meter_id)
            .map_err(|_| SubmitError::MeterNotRegistered(meter_id.clone()))?;

        if !ctx.periods.period(period).is_some_and(|p| p.is_accepting()) {
            return Err(SubmitError::PeriodClosed(period));
        }

        let key = (meter_id.clone(), period);
        if self.submissions.contains_key(&key) {
            return Err(SubmitError::AlreadySubmitted {
                meter: meter_id.clone(),
                period,
            });
        }

        let max_delta = ctx.periods.max_reading_delta();
        let in_range = submission
            .disclosed_reading
            .checked_sub(meter.last_reading)
            .is_some_and(|delta| delta <= max_delta);
        if !in_range {
            warn!(
                "Reading {} from {} out of range (last {}, max delta {})",
                submission.disclosed_reading, meter_id, meter.last_reading, max_delta
            );
            return Err(SubmitError::ReadingOutOfRange {
                last: meter.last_reading,
                submitted: submission.disclosed_reading,
                max_delta,
            });
        }

        // Nothing below may fail once the proof ledger has recorded the nonce
        ctx.proofs.check(meter_id, submission, current_block)?;
        if !ctx.periods.can_record_submission(period) {
            return Err(SubmitError::Overflow);
        }
        let proof_hash = ctx.proofs.verify(meter_id, submission, current_block)?;

        self.submissions.insert(
            key,
            Submission {
                meter_id: meter_id.clone(),
                period,
                encrypted_reading: submission.encrypted_reading.clone(),
                zk_proof: submission.proof.clone(),
                proof_hash,
                submitted_at: current_block,
                verified: true,
                reading_value: submission.disclosed_reading,
            },
        );
        ctx.registry
            .set_last_reading(meter_id, submission.disclosed_reading);
        ctx.periods.record_submission(period);

        info!(
            "Submission accepted: meter={} period={} reading={} proof={}",
            meter_id, period, submission.disclosed_reading, proof_hash
        );
        Ok(proof_hash)
    }

    pub fn submission(&self, meter_id: &Principal, period: PeriodId) -> Option<&Submission> {
        self.submissions.get(&(meter_id.clone(), period))
    }

    pub fn snapshot(&self) -> Vec<Submission> {
        self.submissions.values().cloned().collect()
    }

    pub fn restore(submissions: Vec<Submission>) -> Self {
        Self {
            submissions: submissions
                .into_iter()
                .map(|s| ((s.meter_id.clone(), s.period), s))
                .collect(),
        }
    }
}

impl SubmissionSource for SubmissionPipeline {
    fn get_submission(&self, meter_id: &Principal, period: PeriodId) -> Option<SubmissionView> {
        self.submission(meter_id, period).map(|s| SubmissionView {
            reading_value: s.reading_value,
        })
    }
}
