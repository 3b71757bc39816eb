//! The complete ledger: every core component behind one `&mut self`.
//!
//! `Ledger` wires the components together and converts their errors into
//! [`LedgerError`]. It performs no locking of its own; the async
//! [`LedgerService`](super::LedgerService) serializes access to it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, LedgerConfig};
use crate::models::{
    Bill, BillAmount, BlockHeight, Meter, MeterView, Period, PeriodId, PeriodTotals, Principal,
    ProofHash, ProofRecord, ProofSubmission, ResolvedRate, SettlementId, SettlementSummary,
    Submission, SubmissionReceipt,
};
use crate::services::billing::{
    BatchOutcome, BillingEngine, BillingInputs, BillingSnapshot, ReconcileError,
};
use crate::services::errors::{LedgerError, LedgerResult};
use crate::services::meter_registry::MeterRegistry;
use crate::services::period_manager::{
    PeriodError, PeriodManager, PeriodManagerSnapshot, PeriodParams,
};
use crate::services::proof_ledger::{ProofError, ProofLedger, ProofLedgerSnapshot, ProofParams};
use crate::services::rate_table::{RateError, RateTable, RateTableSnapshot};
use crate::services::submission_pipeline::{SubmissionPipeline, SubmitContext};

/// Current snapshot layout
pub const SNAPSHOT_VERSION: u32 = 1;

/// Admin identity per component. Usually one principal holds all four.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorities {
    pub proofs: Principal,
    pub periods: Principal,
    pub rates: Principal,
    pub billing: Principal,
}

impl Authorities {
    pub fn single(authority: Principal) -> Self {
        Self {
            proofs: authority.clone(),
            periods: authority.clone(),
            rates: authority.clone(),
            billing: authority,
        }
    }
}

/// The four logical tables plus the parameters in force
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub meters: Vec<Meter>,
    pub periods: PeriodManagerSnapshot,
    pub submissions: Vec<Submission>,
    pub proofs: ProofLedgerSnapshot,
    pub rates: RateTableSnapshot,
    pub billing: BillingSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("snapshot rates are invalid: {0}")]
    Rates(#[from] RateError),
    #[error("snapshot billing does not reconcile: {0}")]
    Reconcile(#[from] ReconcileError),
}

#[derive(Debug)]
pub struct Ledger {
    registry: MeterRegistry,
    periods: PeriodManager,
    proofs: ProofLedger,
    pipeline: SubmissionPipeline,
    rates: RateTable,
    billing: BillingEngine,
}

impl Ledger {
    pub fn new(config: &LedgerConfig, authorities: Authorities) -> Result<Self, ConfigError> {
        config.validate()?;
        let rates = RateTable::new(authorities.rates, config.global_rate)
            .map_err(|_| ConfigError::MustBePositive("global_rate"))?;

        info!(
            "Ledger initialized: circuit={} verifier={:?} genesis_block={}",
            config.circuit_id, config.verifier, config.genesis_block
        );
        Ok(Self {
            registry: MeterRegistry::new(),
            periods: PeriodManager::new(
                authorities.periods,
                config.period_params(),
                config.genesis_block,
            ),
            proofs: ProofLedger::new(
                authorities.proofs,
                config.proof_params(),
                config.verifier.build(),
            ),
            pipeline: SubmissionPipeline::new(),
            rates,
            billing: BillingEngine::new(authorities.billing),
        })
    }

    /// Rebuilds a ledger. Snapshot parameters win over `config`; the verifier
    /// always comes from `config`.
    pub fn restore(
        config: &LedgerConfig,
        authorities: Authorities,
        snapshot: LedgerSnapshot,
    ) -> Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }

        let ledger = Self {
            registry: MeterRegistry::restore(snapshot.meters),
            periods: PeriodManager::restore(authorities.periods, snapshot.periods),
            proofs: ProofLedger::restore(
                authorities.proofs,
                config.proof_params(),
                config.verifier.build(),
                snapshot.proofs,
            ),
            pipeline: SubmissionPipeline::restore(snapshot.submissions),
            rates: RateTable::restore(authorities.rates, snapshot.rates)?,
            billing: BillingEngine::restore(authorities.billing, snapshot.billing)?,
        };
        info!(
            "Ledger restored: {} meters, current period {}",
            ledger.registry.len(),
            ledger.periods.current_period()
        );
        Ok(ledger)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            meters: self.registry.snapshot(),
            periods: self.periods.snapshot(),
            submissions: self.pipeline.snapshot(),
            proofs: self.proofs.snapshot(),
            rates: self.rates.snapshot(),
            billing: self.billing.snapshot(),
        }
    }

    // Meters

    pub fn register_meter(
        &mut self,
        meter_id: &Principal,
        settlement_id: SettlementId,
        current_block: BlockHeight,
    ) -> LedgerResult<()> {
        Ok(self.registry.register(meter_id, settlement_id, current_block)?)
    }

    pub fn deregister_meter(&mut self, meter_id: &Principal) -> LedgerResult<()> {
        Ok(self.registry.deregister(meter_id)?)
    }

    pub fn validate_active(&self, meter_id: &Principal) -> LedgerResult<MeterView> {
        Ok(self.registry.validate_active(meter_id)?)
    }

    pub fn meter(&self, meter_id: &Principal) -> Option<&Meter> {
        self.registry.meter(meter_id)
    }

    // Submissions and proofs

    /// Submits a reading into the current period
    pub fn submit_reading(
        &mut self,
        meter_id: &Principal,
        submission: &ProofSubmission,
        current_block: BlockHeight,
    ) -> LedgerResult<SubmissionReceipt> {
        let period = self.periods.current_period();
        let ctx = SubmitContext {
            registry: &mut self.registry,
            periods: &mut self.periods,
            proofs: &mut self.proofs,
        };
        let proof_hash = self
            .pipeline
            .submit(ctx, meter_id, period, submission, current_block)?;
        Ok(SubmissionReceipt {
            meter_id: meter_id.clone(),
            period,
            proof_hash,
            reading_value: submission.disclosed_reading,
        })
    }

    pub fn submission(&self, meter_id: &Principal, period: PeriodId) -> Option<&Submission> {
        self.pipeline.submission(meter_id, period)
    }

    /// Verifies proofs outside a submission; each element stands alone
    pub fn verify_proofs(
        &mut self,
        submitter: &Principal,
        submissions: &[ProofSubmission],
        current_block: BlockHeight,
    ) -> Vec<Result<ProofHash, ProofError>> {
        self.proofs.verify_batch(submitter, submissions, current_block)
    }

    pub fn is_proof_verified(&self, hash: &ProofHash, current_block: BlockHeight) -> bool {
        self.proofs.is_proof_verified(hash, current_block)
    }

    pub fn proof_record(&self, hash: &ProofHash) -> Option<&ProofRecord> {
        self.proofs.proof_record(hash)
    }

    pub fn proof_params(&self) -> ProofParams {
        self.proofs.params()
    }

    pub fn set_circuit_id(&mut self, caller: &Principal, circuit_id: u32) -> LedgerResult<()> {
        Ok(self.proofs.set_circuit_id(caller, circuit_id)?)
    }

    pub fn set_proof_validity_period(&mut self, caller: &Principal, blocks: u64) -> LedgerResult<()> {
        Ok(self.proofs.set_proof_validity_period(caller, blocks)?)
    }

    pub fn set_max_proof_age(&mut self, caller: &Principal, blocks: u64) -> LedgerResult<()> {
        Ok(self.proofs.set_max_proof_age(caller, blocks)?)
    }

    pub fn register_public_key(
        &mut self,
        caller: &Principal,
        submitter: &Principal,
        key: Vec<u8>,
    ) -> LedgerResult<()> {
        Ok(self.proofs.register_public_key(caller, submitter, key)?)
    }

    /// Applies the given proof parameters together or not at all
    pub fn update_proof_params(
        &mut self,
        caller: &Principal,
        circuit_id: Option<u32>,
        max_proof_age: Option<u64>,
        proof_validity_period: Option<u64>,
    ) -> LedgerResult<ProofParams> {
        if caller != self.proofs.authority() {
            return Err(ProofError::Unauthorized.into());
        }
        if max_proof_age == Some(0) {
            return Err(ProofError::InvalidParameter("max_proof_age").into());
        }
        if proof_validity_period == Some(0) {
            return Err(ProofError::InvalidParameter("proof_validity_period").into());
        }

        if let Some(circuit_id) = circuit_id {
            self.proofs.set_circuit_id(caller, circuit_id)?;
        }
        if let Some(blocks) = max_proof_age {
            self.proofs.set_max_proof_age(caller, blocks)?;
        }
        if let Some(blocks) = proof_validity_period {
            self.proofs.set_proof_validity_period(caller, blocks)?;
        }
        Ok(self.proofs.params())
    }

    // Periods

    pub fn current_period(&self) -> PeriodId {
        self.periods.current_period()
    }

    pub fn period(&self, id: PeriodId) -> Option<&Period> {
        self.periods.period(id)
    }

    pub fn period_params(&self) -> PeriodParams {
        self.periods.params()
    }

    pub fn advance_period(
        &mut self,
        caller: &Principal,
        current_block: BlockHeight,
    ) -> LedgerResult<PeriodId> {
        Ok(self.periods.advance_period(caller, current_block)?)
    }

    pub fn pause_period(&mut self, caller: &Principal, current_block: BlockHeight) -> LedgerResult<()> {
        Ok(self.periods.pause(caller, current_block)?)
    }

    /// Applies the given period parameters together or not at all
    pub fn update_period_params(
        &mut self,
        caller: &Principal,
        period_duration: Option<u64>,
        max_reading_delta: Option<u64>,
    ) -> LedgerResult<PeriodParams> {
        if caller != self.periods.authority() {
            return Err(PeriodError::Unauthorized.into());
        }
        if period_duration == Some(0) {
            return Err(PeriodError::InvalidParameter("period_duration").into());
        }
        if max_reading_delta == Some(0) {
            return Err(PeriodError::InvalidParameter("max_reading_delta").into());
        }

        if let Some(blocks) = period_duration {
            self.periods.set_period_duration(caller, blocks)?;
        }
        if let Some(delta) = max_reading_delta {
            self.periods.set_max_reading_delta(caller, delta)?;
        }
        Ok(self.periods.params())
    }

    // Rates

    pub fn set_global_rate(&mut self, caller: &Principal, rate: u64) -> LedgerResult<()> {
        Ok(self.rates.set_global_rate(caller, rate)?)
    }

    pub fn set_settlement_rate(
        &mut self,
        caller: &Principal,
        settlement_id: SettlementId,
        rate: u64,
    ) -> LedgerResult<()> {
        Ok(self.rates.set_settlement_rate(caller, settlement_id, rate)?)
    }

    pub fn remove_settlement_rate(
        &mut self,
        caller: &Principal,
        settlement_id: SettlementId,
    ) -> LedgerResult<Option<u64>> {
        Ok(self.rates.remove_settlement_rate(caller, settlement_id)?)
    }

    pub fn resolve_rate(&self, settlement_id: SettlementId) -> ResolvedRate {
        self.rates.resolve(settlement_id)
    }

    // Billing

    pub fn calculate_bill(
        &mut self,
        meter_id: &Principal,
        period: PeriodId,
        current_block: BlockHeight,
    ) -> LedgerResult<BillAmount> {
        let inputs = BillingInputs {
            meters: &self.registry,
            periods: &self.periods,
            submissions: &self.pipeline,
            rates: &self.rates,
        };
        Ok(self
            .billing
            .calculate_bill(&inputs, meter_id, period, current_block)?)
    }

    pub fn batch_calculate(
        &mut self,
        meter_ids: &[Principal],
        period: PeriodId,
        current_block: BlockHeight,
    ) -> BatchOutcome {
        let inputs = BillingInputs {
            meters: &self.registry,
            periods: &self.periods,
            submissions: &self.pipeline,
            rates: &self.rates,
        };
        self.billing
            .batch_calculate(&inputs, meter_ids, period, current_block)
    }

    pub fn mark_paid(
        &mut self,
        caller: &Principal,
        meter_id: &Principal,
        period: PeriodId,
    ) -> LedgerResult<()> {
        Ok(self.billing.mark_paid(caller, meter_id, period)?)
    }

    pub fn get_bill(&self, meter_id: &Principal, period: PeriodId) -> Option<&Bill> {
        self.billing.get_bill(meter_id, period)
    }

    pub fn bills_for_meter(&self, meter_id: &Principal) -> Vec<&Bill> {
        self.billing.bills_for_meter(meter_id)
    }

    pub fn period_totals(&self, period: PeriodId) -> Option<PeriodTotals> {
        self.billing.period_totals(period)
    }

    pub fn outstanding_balance(&self, meter_id: &Principal, up_to_period: PeriodId) -> LedgerResult<u64> {
        self.billing
            .outstanding_balance(meter_id, up_to_period)
            .map_err(LedgerError::from)
    }

    pub fn settlement_summary(&self, settlement_id: SettlementId, period: PeriodId) -> SettlementSummary {
        self.billing
            .settlement_summary(&self.rates, settlement_id, period)
    }
}
