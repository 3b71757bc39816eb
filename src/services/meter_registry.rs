use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{BlockHeight, Meter, MeterInfo, MeterView, Principal, SettlementId};
use crate::services::billing::MeterDirectory;
use crate::services::errors::{Categorized, ErrorCategory};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("meter {0} is already registered")]
    AlreadyRegistered(Principal),
    #[error("meter {0} is not registered or already inactive")]
    NotRegistered(Principal),
    #[error("meter {0} is not registered")]
    MeterNotRegistered(Principal),
}

impl Categorized for RegistryError {
    fn category(&self) -> ErrorCategory {
        match self {
            RegistryError::AlreadyRegistered(_) => ErrorCategory::Conflict,
            RegistryError::NotRegistered(_) | RegistryError::MeterNotRegistered(_) => {
                ErrorCategory::NotFound
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            RegistryError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            RegistryError::NotRegistered(_) => "NOT_REGISTERED",
            RegistryError::MeterNotRegistered(_) => "METER_NOT_REGISTERED",
        }
    }
}

/// Meter identities and their settlement membership.
///
/// Records are soft-deleted: a deregistered meter keeps its record and can
/// never register again under the same identity.
#[derive(Debug, Clone, Default)]
pub struct MeterRegistry {
    meters: BTreeMap<Principal, Meter>,
}

impl MeterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        meter_id: &Principal,
        settlement_id: SettlementId,
        current_block: BlockHeight,
    ) -> Result<(), RegistryError> {
        if self.meters.contains_key(meter_id) {
            warn!("Rejected re-registration of meter {}", meter_id);
            return Err(RegistryError::AlreadyRegistered(meter_id.clone()));
        }

        self.meters.insert(
            meter_id.clone(),
            Meter {
                meter_id: meter_id.clone(),
                settlement_id,
                last_reading: 0,
                registered_at: current_block,
                active: true,
            },
        );
        info!(
            "Meter {} registered in settlement {} at block {}",
            meter_id, settlement_id, current_block
        );
        Ok(())
    }

    pub fn deregister(&mut self, meter_id: &Principal) -> Result<(), RegistryError> {
        match self.meters.get_mut(meter_id) {
            Some(meter) if meter.active => {
                meter.active = false;
                info!("Meter {} deregistered", meter_id);
                Ok(())
            }
            _ => Err(RegistryError::NotRegistered(meter_id.clone())),
        }
    }

    /// Read-only gate shared by submission and billing
    pub fn validate_active(&self, meter_id: &Principal) -> Result<MeterView, RegistryError> {
        self.meters
            .get(meter_id)
            .filter(|meter| meter.active)
            .map(MeterView::from)
            .ok_or_else(|| {
                debug!("Meter {} is not active", meter_id);
                RegistryError::MeterNotRegistered(meter_id.clone())
            })
    }

    /// Full record, including inactive meters
    pub fn meter(&self, meter_id: &Principal) -> Option<&Meter> {
        self.meters.get(meter_id)
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    /// Advances the accepted reading. Callers have already range-checked it.
    pub(crate) fn set_last_reading(&mut self, meter_id: &Principal, reading: u64) {
        if let Some(meter) = self.meters.get_mut(meter_id) {
            meter.last_reading = reading;
        }
    }

    pub fn snapshot(&self) -> Vec<Meter> {
        self.meters.values().cloned().collect()
    }

    pub fn restore(meters: Vec<Meter>) -> Self {
        Self {
            meters: meters
                .into_iter()
                .map(|meter| (meter.meter_id.clone(), meter))
                .collect(),
        }
    }
}

impl MeterDirectory for MeterRegistry {
    fn get_meter_info(&self, meter_id: &Principal) -> Option<MeterInfo> {
        self.meters.get(meter_id).map(|meter| MeterInfo {
            settlement_id: meter.settlement_id,
            active: meter.active,
        })
    }
}
