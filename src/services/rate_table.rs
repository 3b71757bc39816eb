use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{Principal, RateSource, ResolvedRate, SettlementId};
use crate::services::billing::RateResolver;
use crate::services::errors::{Categorized, ErrorCategory};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("caller is not the rate authority")]
    Unauthorized,
    #[error("rate must be greater than zero")]
    InvalidRate,
}

impl Categorized for RateError {
    fn category(&self) -> ErrorCategory {
        match self {
            RateError::Unauthorized => ErrorCategory::Authorization,
            RateError::InvalidRate => ErrorCategory::Validation,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            RateError::Unauthorized => "UNAUTHORIZED",
            RateError::InvalidRate => "INVALID_RATE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTableSnapshot {
    pub global_rate: u64,
    pub settlement_rates: Vec<(SettlementId, u64)>,
}

/// Global tariff plus per-settlement overrides
#[derive(Debug, Clone)]
pub struct RateTable {
    authority: Principal,
    global_rate: u64,
    settlement_rates: BTreeMap<SettlementId, u64>,
}

impl RateTable {
    pub fn new(authority: Principal, global_rate: u64) -> Result<Self, RateError> {
        if global_rate == 0 {
            return Err(RateError::InvalidRate);
        }
        Ok(Self {
            authority,
            global_rate,
            settlement_rates: BTreeMap::new(),
        })
    }

    pub fn global_rate(&self) -> u64 {
        self.global_rate
    }

    pub fn settlement_rate(&self, settlement_id: SettlementId) -> Option<u64> {
        self.settlement_rates.get(&settlement_id).copied()
    }

    fn ensure_authority(&self, caller: &Principal) -> Result<(), RateError> {
        if caller != &self.authority {
            warn!("Unauthorized rate change by {}", caller);
            return Err(RateError::Unauthorized);
        }
        Ok(())
    }

    pub fn set_global_rate(&mut self, caller: &Principal, rate: u64) -> Result<(), RateError> {
        self.ensure_authority(caller)?;
        if rate == 0 {
            return Err(RateError::InvalidRate);
        }
        info!("Global rate: {} -> {}", self.global_rate, rate);
        self.global_rate = rate;
        Ok(())
    }

    pub fn set_settlement_rate(
        &mut self,
        caller: &Principal,
        settlement_id: SettlementId,
        rate: u64,
    ) -> Result<(), RateError> {
        self.ensure_authority(caller)?;
        if rate == 0 {
            return Err(RateError::InvalidRate);
        }
        self.settlement_rates.insert(settlement_id, rate);
        info!("Settlement {} rate set to {}", settlement_id, rate);
        Ok(())
    }

    /// Drops a settlement override, returning the removed rate if there was one
    pub fn remove_settlement_rate(
        &mut self,
        caller: &Principal,
        settlement_id: SettlementId,
    ) -> Result<Option<u64>, RateError> {
        self.ensure_authority(caller)?;
        let removed = self.settlement_rates.remove(&settlement_id);
        if removed.is_some() {
            info!("Settlement {} rate removed, falling back to global", settlement_id);
        }
        Ok(removed)
    }

    /// Settlement rate if present, else the global rate
    pub fn resolve(&self, settlement_id: SettlementId) -> ResolvedRate {
        match self.settlement_rates.get(&settlement_id) {
            Some(&rate) => ResolvedRate {
                rate,
                source: RateSource::Settlement,
            },
            None => ResolvedRate {
                rate: self.global_rate,
                source: RateSource::Global,
            },
        }
    }

    pub fn snapshot(&self) -> RateTableSnapshot {
        RateTableSnapshot {
            global_rate: self.global_rate,
            settlement_rates: self
                .settlement_rates
                .iter()
                .map(|(id, rate)| (*id, *rate))
                .collect(),
        }
    }

    pub fn restore(authority: Principal, snapshot: RateTableSnapshot) -> Result<Self, RateError> {
        let mut table = Self::new(authority, snapshot.global_rate)?;
        for (settlement_id, rate) in snapshot.settlement_rates {
            if rate == 0 {
                return Err(RateError::InvalidRate);
            }
            table.settlement_rates.insert(settlement_id, rate);
        }
        Ok(table)
    }
}

impl RateResolver for RateTable {
    fn resolve_rate(&self, settlement_id: SettlementId) -> ResolvedRate {
        self.resolve(settlement_id)
    }
}
