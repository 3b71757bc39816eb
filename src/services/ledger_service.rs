use std::sync::Arc;

use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::{
    Bill, BillAmount, BlockHeight, Meter, Period, PeriodId, PeriodTotals, Principal, ProofHash,
    ProofRecord, ProofSubmission, ResolvedRate, SettlementId, SettlementSummary, Submission,
    SubmissionReceipt,
};
use crate::services::billing::BatchOutcome;
use crate::services::errors::{Categorized, LedgerResult};
use crate::services::ledger::{Ledger, LedgerSnapshot};
use crate::services::period_manager::PeriodParams;
use crate::services::proof_ledger::{ProofError, ProofParams};

/// Shared, serialized access to the ledger.
///
/// Every mutating call holds the write lock for its whole duration, so no
/// two mutations interleave and readers never see a half-applied call.
#[derive(Clone)]
pub struct LedgerService {
    ledger: Arc<RwLock<Ledger>>,
}

fn outcome_label<T, E: Categorized>(result: &Result<T, E>) -> &'static str {
    match result {
        Ok(_) => "accepted",
        Err(e) => e.code(),
    }
}

impl LedgerService {
    pub fn new(ledger: Ledger) -> Self {
        info!("✅ Ledger service initialized");
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
        }
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.read().await.snapshot()
    }

    pub async fn register_meter(
        &self,
        meter_id: &Principal,
        settlement_id: SettlementId,
        current_block: BlockHeight,
    ) -> LedgerResult<()> {
        self.ledger
            .write()
            .await
            .register_meter(meter_id, settlement_id, current_block)
    }

    pub async fn deregister_meter(&self, meter_id: &Principal) -> LedgerResult<()> {
        self.ledger.write().await.deregister_meter(meter_id)
    }

    pub async fn meter(&self, meter_id: &Principal) -> Option<Meter> {
        self.ledger.read().await.meter(meter_id).cloned()
    }

    pub async fn submit_reading(
        &self,
        meter_id: &Principal,
        submission: &ProofSubmission,
        current_block: BlockHeight,
    ) -> LedgerResult<SubmissionReceipt> {
        let result = self
            .ledger
            .write()
            .await
            .submit_reading(meter_id, submission, current_block);
        counter!("ledger_submissions_total", "outcome" => outcome_label(&result)).increment(1);
        result
    }

    pub async fn submission(&self, meter_id: &Principal, period: PeriodId) -> Option<Submission> {
        self.ledger.read().await.submission(meter_id, period).cloned()
    }

    pub async fn verify_proofs(
        &self,
        submitter: &Principal,
        submissions: &[ProofSubmission],
        current_block: BlockHeight,
    ) -> Vec<Result<ProofHash, ProofError>> {
        self.ledger
            .write()
            .await
            .verify_proofs(submitter, submissions, current_block)
    }

    pub async fn is_proof_verified(&self, hash: &ProofHash, current_block: BlockHeight) -> bool {
        self.ledger.read().await.is_proof_verified(hash, current_block)
    }

    pub async fn proof_record(&self, hash: &ProofHash) -> Option<ProofRecord> {
        self.ledger.read().await.proof_record(hash).cloned()
    }

    pub async fn proof_params(&self) -> ProofParams {
        self.ledger.read().await.proof_params()
    }

    pub async fn update_proof_params(
        &self,
        caller: &Principal,
        circuit_id: Option<u32>,
        max_proof_age: Option<u64>,
        proof_validity_period: Option<u64>,
    ) -> LedgerResult<ProofParams> {
        self.ledger.write().await.update_proof_params(
            caller,
            circuit_id,
            max_proof_age,
            proof_validity_period,
        )
    }

    pub async fn register_public_key(
        &self,
        caller: &Principal,
        submitter: &Principal,
        key: Vec<u8>,
    ) -> LedgerResult<()> {
        self.ledger
            .write()
            .await
            .register_public_key(caller, submitter, key)
    }

    pub async fn current_period(&self) -> PeriodId {
        self.ledger.read().await.current_period()
    }

    pub async fn period(&self, id: PeriodId) -> Option<Period> {
        self.ledger.read().await.period(id).cloned()
    }

    /// Current period id and its metadata, read under one lock
    pub async fn current_period_with_metadata(&self) -> (PeriodId, Option<Period>) {
        let ledger = self.ledger.read().await;
        let current = ledger.current_period();
        (current, ledger.period(current).cloned())
    }

    pub async fn advance_period(
        &self,
        caller: &Principal,
        current_block: BlockHeight,
    ) -> LedgerResult<PeriodId> {
        let next = self
            .ledger
            .write()
            .await
            .advance_period(caller, current_block)?;
        counter!("ledger_periods_advanced_total").increment(1);
        Ok(next)
    }

    pub async fn pause_period(&self, caller: &Principal, current_block: BlockHeight) -> LedgerResult<()> {
        self.ledger.write().await.pause_period(caller, current_block)
    }

    pub async fn update_period_params(
        &self,
        caller: &Principal,
        period_duration: Option<u64>,
        max_reading_delta: Option<u64>,
    ) -> LedgerResult<PeriodParams> {
        self.ledger
            .write()
            .await
            .update_period_params(caller, period_duration, max_reading_delta)
    }

    pub async fn set_global_rate(&self, caller: &Principal, rate: u64) -> LedgerResult<()> {
        self.ledger.write().await.set_global_rate(caller, rate)
    }

    pub async fn set_settlement_rate(
        &self,
        caller: &Principal,
        settlement_id: SettlementId,
        rate: u64,
    ) -> LedgerResult<()> {
        self.ledger
            .write()
            .await
            .set_settlement_rate(caller, settlement_id, rate)
    }

    pub async fn remove_settlement_rate(
        &self,
        caller: &Principal,
        settlement_id: SettlementId,
    ) -> LedgerResult<Option<u64>> {
        self.ledger
            .write()
            .await
            .remove_settlement_rate(caller, settlement_id)
    }

    pub async fn resolve_rate(&self, settlement_id: SettlementId) -> ResolvedRate {
        self.ledger.read().await.resolve_rate(settlement_id)
    }

    pub async fn calculate_bill(
        &self,
        meter_id: &Principal,
        period: PeriodId,
        current_block: BlockHeight,
    ) -> LedgerResult<BillAmount> {
        let result = self
            .ledger
            .write()
            .await
            .calculate_bill(meter_id, period, current_block);
        counter!("ledger_bills_total", "outcome" => outcome_label(&result)).increment(1);
        result
    }

    pub async fn batch_calculate(
        &self,
        meter_ids: &[Principal],
        period: PeriodId,
        current_block: BlockHeight,
    ) -> BatchOutcome {
        let outcome = self
            .ledger
            .write()
            .await
            .batch_calculate(meter_ids, period, current_block);
        for (_, result) in &outcome.results {
            counter!("ledger_bills_total", "outcome" => outcome_label(result)).increment(1);
        }
        debug!(
            "Batch billing period {}: {}/{} succeeded",
            period,
            outcome.succeeded,
            outcome.results.len()
        );
        outcome
    }

    pub async fn mark_paid(
        &self,
        caller: &Principal,
        meter_id: &Principal,
        period: PeriodId,
    ) -> LedgerResult<()> {
        self.ledger.write().await.mark_paid(caller, meter_id, period)?;
        counter!("ledger_payments_total").increment(1);
        Ok(())
    }

    pub async fn get_bill(&self, meter_id: &Principal, period: PeriodId) -> Option<Bill> {
        self.ledger.read().await.get_bill(meter_id, period).cloned()
    }

    pub async fn bills_for_meter(&self, meter_id: &Principal) -> Vec<Bill> {
        self.ledger
            .read()
            .await
            .bills_for_meter(meter_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn period_totals(&self, period: PeriodId) -> Option<PeriodTotals> {
        self.ledger.read().await.period_totals(period)
    }

    pub async fn outstanding_balance(
        &self,
        meter_id: &Principal,
        up_to_period: PeriodId,
    ) -> LedgerResult<u64> {
        self.ledger
            .read()
            .await
            .outstanding_balance(meter_id, up_to_period)
    }

    pub async fn settlement_summary(
        &self,
        settlement_id: SettlementId,
        period: PeriodId,
    ) -> SettlementSummary {
        self.ledger
            .read()
            .await
            .settlement_summary(settlement_id, period)
    }
}
