//! Bill calculation and payment tracking.
//!
//! Billing owns bills and their aggregates. It reads meters, period status,
//! submissions and rates only through the collaborator traits in
//! [`types`], so the engine can be exercised against any implementation.

pub mod types;

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::models::{
    Bill, BillAmount, BlockHeight, PeriodId, PeriodStatus, PeriodTotals, Principal,
    SettlementId, SettlementSummary,
};

pub use types::*;

#[derive(Debug, Clone)]
pub struct BillingEngine {
    authority: Principal,
    bills: BTreeMap<(Principal, PeriodId), Bill>,
    period_totals: BTreeMap<PeriodId, PeriodTotals>,
    settlement_totals: BTreeMap<(SettlementId, PeriodId), PeriodTotals>,
}

impl BillingEngine {
    pub fn new(authority: Principal) -> Self {
        Self {
            authority,
            bills: BTreeMap::new(),
            period_totals: BTreeMap::new(),
            settlement_totals: BTreeMap::new(),
        }
    }

    pub fn authority(&self) -> &Principal {
        &self.authority
    }

    /// Computes and stores the bill for `(meter_id, period)`. Compute-once.
    pub fn calculate_bill(
        &mut self,
        inputs: &BillingInputs<'_>,
        meter_id: &Principal,
        period: PeriodId,
        current_block: BlockHeight,
    ) -> Result<BillAmount, BillError> {
        let meter = inputs
            .meters
            .get_meter_info(meter_id)
            .filter(|info| info.active)
            .ok_or_else(|| BillError::MeterNotRegistered(meter_id.clone()))?;

        let key = (meter_id.clone(), period);
        if self.bills.contains_key(&key) {
            return Err(BillError::AlreadyCalculated {
                meter: meter_id.clone(),
                period,
            });
        }

        let status = inputs.periods.get_period_status(period);
        if status != Some(PeriodStatus::Closed) {
            return Err(BillError::PeriodNotClosed { period, status });
        }

        let usage = inputs
            .submissions
            .get_submission(meter_id, period)
            .map(|s| s.reading_value)
            .unwrap_or(0);
        if usage == 0 {
            debug!("No usage for {} in period {}", meter_id, period);
            return Err(BillError::ZeroUsage {
                meter: meter_id.clone(),
                period,
            });
        }

        let rate = inputs.rates.resolve_rate(meter.settlement_id).rate;
        if rate == 0 {
            return Err(BillError::RateNotSet(meter.settlement_id));
        }

        let amount = usage.checked_mul(rate).ok_or(BillError::Overflow)?;

        let period_totals = self
            .period_totals
            .get(&period)
            .copied()
            .unwrap_or_default()
            .with_bill(usage, amount)
            .ok_or(BillError::Overflow)?;
        let settlement_key = (meter.settlement_id, period);
        let settlement_totals = self
            .settlement_totals
            .get(&settlement_key)
            .copied()
            .unwrap_or_default()
            .with_bill(usage, amount)
            .ok_or(BillError::Overflow)?;

        self.bills.insert(
            key,
            Bill {
                meter_id: meter_id.clone(),
                period,
                usage,
                rate,
                amount_due: amount,
                calculated_at: current_block,
                paid: false,
                settlement_id: meter.settlement_id,
            },
        );
        self.period_totals.insert(period, period_totals);
        self.settlement_totals.insert(settlement_key, settlement_totals);

        info!(
            "Bill calculated: meter={} period={} usage={} rate={} amount={}",
            meter_id, period, usage, rate, amount
        );
        Ok(BillAmount { usage, amount })
    }

    /// Calculates each meter independently
    pub fn batch_calculate(
        &mut self,
        inputs: &BillingInputs<'_>,
        meter_ids: &[Principal],
        period: PeriodId,
        current_block: BlockHeight,
    ) -> BatchOutcome {
        let results: Vec<_> = meter_ids
            .iter()
            .map(|meter_id| {
                let result = self.calculate_bill(inputs, meter_id, period, current_block);
                if let Err(e) = &result {
                    warn!("Batch billing skipped {}: {}", meter_id, e);
                }
                (meter_id.clone(), result)
            })
            .collect();

        let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
        let failed = results.len() - succeeded;
        info!(
            "Batch billing for period {}: {} succeeded, {} failed",
            period, succeeded, failed
        );

        BatchOutcome {
            results,
            succeeded,
            failed,
        }
    }

    /// Flips a bill to paid. One-way.
    pub fn mark_paid(
        &mut self,
        caller: &Principal,
        meter_id: &Principal,
        period: PeriodId,
    ) -> Result<(), PayError> {
        if caller != &self.authority {
            warn!("Unauthorized payment mark by {}", caller);
            return Err(PayError::Unauthorized);
        }

        let bill = self
            .bills
            .get_mut(&(meter_id.clone(), period))
            .ok_or_else(|| PayError::BillNotFound {
                meter: meter_id.clone(),
                period,
            })?;
        if bill.paid {
            return Err(PayError::AlreadyPaid {
                meter: meter_id.clone(),
                period,
            });
        }

        bill.paid = true;
        info!("Bill paid: meter={} period={}", meter_id, period);
        Ok(())
    }

    pub fn get_bill(&self, meter_id: &Principal, period: PeriodId) -> Option<&Bill> {
        self.bills.get(&(meter_id.clone(), period))
    }

    /// A meter's bills in period order
    pub fn bills_for_meter(&self, meter_id: &Principal) -> Vec<&Bill> {
        self.bills
            .range((meter_id.clone(), PeriodId::MIN)..=(meter_id.clone(), PeriodId::MAX))
            .map(|(_, bill)| bill)
            .collect()
    }

    pub fn period_totals(&self, period: PeriodId) -> Option<PeriodTotals> {
        self.period_totals.get(&period).copied()
    }

    pub fn settlement_totals(&self, settlement_id: SettlementId, period: PeriodId) -> Option<PeriodTotals> {
        self.settlement_totals.get(&(settlement_id, period)).copied()
    }

    /// Sum of unpaid `amount_due` over periods `0..=up_to_period`
    pub fn outstanding_balance(
        &self,
        meter_id: &Principal,
        up_to_period: PeriodId,
    ) -> Result<u64, BillError> {
        self.bills
            .range((meter_id.clone(), PeriodId::MIN)..=(meter_id.clone(), up_to_period))
            .filter(|(_, bill)| !bill.paid)
            .try_fold(0u64, |sum, (_, bill)| sum.checked_add(bill.amount_due))
            .ok_or(BillError::Overflow)
    }

    pub fn settlement_summary(
        &self,
        rates: &dyn RateResolver,
        settlement_id: SettlementId,
        period: PeriodId,
    ) -> SettlementSummary {
        SettlementSummary {
            settlement_id,
            period,
            period_totals: self.period_totals(period).unwrap_or_default(),
            settlement_totals: self
                .settlement_totals(settlement_id, period)
                .unwrap_or_default(),
            effective_rate: rates.resolve_rate(settlement_id),
        }
    }

    pub fn snapshot(&self) -> BillingSnapshot {
        BillingSnapshot {
            bills: self.bills.values().cloned().collect(),
            period_totals: self
                .period_totals
                .iter()
                .map(|(period, totals)| (*period, *totals))
                .collect(),
            settlement_totals: self
                .settlement_totals
                .iter()
                .map(|((settlement, period), totals)| (*settlement, *period, *totals))
                .collect(),
        }
    }

    /// Rebuilds the engine, recomputing every aggregate from the bills and
    /// rejecting snapshots whose stored totals disagree.
    pub fn restore(authority: Principal, snapshot: BillingSnapshot) -> Result<Self, ReconcileError> {
        let mut engine = Self::new(authority);

        for bill in snapshot.bills {
            let key = (bill.meter_id.clone(), bill.period);
            if engine.bills.contains_key(&key) {
                return Err(ReconcileError::DuplicateBill(bill.meter_id, bill.period));
            }

            let period_totals = engine.period_totals.entry(bill.period).or_default();
            *period_totals = period_totals
                .with_bill(bill.usage, bill.amount_due)
                .ok_or(ReconcileError::Overflow)?;
            let settlement_totals = engine
                .settlement_totals
                .entry((bill.settlement_id, bill.period))
                .or_default();
            *settlement_totals = settlement_totals
                .with_bill(bill.usage, bill.amount_due)
                .ok_or(ReconcileError::Overflow)?;

            engine.bills.insert(key, bill);
        }

        let stored_periods: BTreeMap<PeriodId, PeriodTotals> =
            snapshot.period_totals.into_iter().collect();
        if let Some(period) = first_mismatch(&engine.period_totals, &stored_periods) {
            return Err(ReconcileError::PeriodTotals(period));
        }
        let stored_settlements: BTreeMap<(SettlementId, PeriodId), PeriodTotals> = snapshot
            .settlement_totals
            .into_iter()
            .map(|(settlement, period, totals)| ((settlement, period), totals))
            .collect();
        if let Some((settlement, period)) =
            first_mismatch(&engine.settlement_totals, &stored_settlements)
        {
            return Err(ReconcileError::SettlementTotals(settlement, period));
        }

        Ok(engine)
    }
}

/// First key whose totals differ between the recomputed and stored maps
fn first_mismatch<K: Ord + Copy>(
    computed: &BTreeMap<K, PeriodTotals>,
    stored: &BTreeMap<K, PeriodTotals>,
) -> Option<K> {
    computed
        .keys()
        .chain(stored.keys())
        .find(|key| computed.get(*key) != stored.get(*key))
        .copied()
}
