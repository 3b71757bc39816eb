use serde::{Deserialize, Serialize};

use super::{BlockHeight, PeriodId, Principal, SettlementId};

/// Immutable bill for one (meter, period). Only `paid` ever changes,
/// and only from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub meter_id: Principal,
    pub period: PeriodId,
    pub usage: u64,
    pub rate: u64,
    pub amount_due: u64,
    pub calculated_at: BlockHeight,
    pub paid: bool,
    /// Settlement membership at calculation time
    pub settlement_id: SettlementId,
}

/// Result of a successful bill calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillAmount {
    pub usage: u64,
    pub amount: u64,
}

/// Running aggregate over all bills of a period (or of a settlement within a period)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub total_usage: u64,
    pub total_billed: u64,
    pub bill_count: u64,
}

impl PeriodTotals {
    /// Returns the totals after adding one bill, or `None` on overflow
    pub fn with_bill(&self, usage: u64, amount: u64) -> Option<Self> {
        Some(Self {
            total_usage: self.total_usage.checked_add(usage)?,
            total_billed: self.total_billed.checked_add(amount)?,
            bill_count: self.bill_count.checked_add(1)?,
        })
    }
}

/// Which tariff a rate lookup resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Settlement,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub rate: u64,
    pub source: RateSource,
}

/// Settlement-level report for one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementSummary {
    pub settlement_id: SettlementId,
    pub period: PeriodId,
    /// Period-wide totals across every settlement
    pub period_totals: PeriodTotals,
    /// This settlement's share of the period
    pub settlement_totals: PeriodTotals,
    pub effective_rate: ResolvedRate,
}
