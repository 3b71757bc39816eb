use serde::{Deserialize, Serialize};

use super::{BlockHeight, Principal, SettlementId};

/// Registration record of a meter.
///
/// Records are never removed: deregistration only clears `active`, which
/// keeps the identity locked out of re-registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    pub meter_id: Principal,
    pub settlement_id: SettlementId,
    /// Last accepted cumulative reading; never decreases
    pub last_reading: u64,
    pub registered_at: BlockHeight,
    pub active: bool,
}

/// Read-only view handed out by `MeterRegistry::validate_active`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeterView {
    pub meter_id: Principal,
    pub settlement_id: SettlementId,
    pub last_reading: u64,
    pub registered_at: BlockHeight,
}

impl From<&Meter> for MeterView {
    fn from(meter: &Meter) -> Self {
        Self {
            meter_id: meter.meter_id.clone(),
            settlement_id: meter.settlement_id,
            last_reading: meter.last_reading,
            registered_at: meter.registered_at,
        }
    }
}

/// Collaborator-facing answer to `get_meter_info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeterInfo {
    pub settlement_id: SettlementId,
    pub active: bool,
}
