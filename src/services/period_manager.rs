//! Billing period lifecycle.
//!
//! Exactly one period is current at any time. Periods move from `active` to
//! `closed`, or from `active` to `paused` and then to `closed` when the
//! authority advances past them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{BlockHeight, Period, PeriodId, PeriodStatus, Principal};
use crate::services::billing::PeriodStatusSource;
use crate::services::errors::{Categorized, ErrorCategory};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("caller is not the period authority")]
    Unauthorized,
    #[error("period {period} is {status}, not active")]
    PeriodNotActive {
        period: PeriodId,
        status: PeriodStatus,
    },
    #[error("invalid parameter: {0} must be greater than zero")]
    InvalidParameter(&'static str),
    #[error("period counter overflow")]
    Overflow,
}

impl Categorized for PeriodError {
    fn category(&self) -> ErrorCategory {
        match self {
            PeriodError::Unauthorized => ErrorCategory::Authorization,
            PeriodError::PeriodNotActive { .. } => ErrorCategory::Temporal,
            PeriodError::InvalidParameter(_) => ErrorCategory::Validation,
            PeriodError::Overflow => ErrorCategory::Integrity,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            PeriodError::Unauthorized => "UNAUTHORIZED",
            PeriodError::PeriodNotActive { .. } => "PERIOD_NOT_ACTIVE",
            PeriodError::InvalidParameter(_) => "INVALID_PARAMETER",
            PeriodError::Overflow => "OVERFLOW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodParams {
    /// Advisory length of newly created periods, in blocks
    pub period_duration: u64,
    /// Largest reading increase accepted in one submission
    pub max_reading_delta: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodManagerSnapshot {
    pub current: PeriodId,
    pub params: PeriodParams,
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone)]
pub struct PeriodManager {
    authority: Principal,
    params: PeriodParams,
    current: PeriodId,
    periods: BTreeMap<PeriodId, Period>,
}

impl PeriodManager {
    /// Opens genesis period 0 at `genesis_block`
    pub fn new(authority: Principal, params: PeriodParams, genesis_block: BlockHeight) -> Self {
        let mut periods = BTreeMap::new();
        periods.insert(0, Period::open(0, genesis_block, params.period_duration));
        Self {
            authority,
            params,
            current: 0,
            periods,
        }
    }

    pub fn params(&self) -> PeriodParams {
        self.params
    }

    pub fn authority(&self) -> &Principal {
        &self.authority
    }

    pub fn current_period(&self) -> PeriodId {
        self.current
    }

    pub fn period(&self, id: PeriodId) -> Option<&Period> {
        self.periods.get(&id)
    }

    pub fn max_reading_delta(&self) -> u64 {
        self.params.max_reading_delta
    }

    fn ensure_authority(&self, caller: &Principal) -> Result<(), PeriodError> {
        if caller != &self.authority {
            warn!("Unauthorized period call by {}", caller);
            return Err(PeriodError::Unauthorized);
        }
        Ok(())
    }

    /// Closes the current period and opens the next one.
    ///
    /// A current period without metadata is skipped silently.
    pub fn advance_period(
        &mut self,
        caller: &Principal,
        current_block: BlockHeight,
    ) -> Result<PeriodId, PeriodError> {
        self.ensure_authority(caller)?;
        let next = self.current.checked_add(1).ok_or(PeriodError::Overflow)?;

        match self.periods.get_mut(&self.current) {
            Some(period) => {
                period.status = PeriodStatus::Closed;
                info!(
                    "Period {} closed with {} submissions",
                    period.id, period.total_submissions
                );
            }
            None => debug!("Period {} has no metadata, nothing to close", self.current),
        }

        self.periods.insert(
            next,
            Period::open(next, current_block, self.params.period_duration),
        );
        self.current = next;
        info!("Period {} opened at block {}", next, current_block);
        Ok(next)
    }

    /// Emergency halt of the current period
    pub fn pause(&mut self, caller: &Principal, current_block: BlockHeight) -> Result<(), PeriodError> {
        self.ensure_authority(caller)?;
        let current = self.current;
        match self.periods.get_mut(&current) {
            Some(period) if period.status == PeriodStatus::Active => {
                period.status = PeriodStatus::Paused;
            }
            Some(period) => {
                return Err(PeriodError::PeriodNotActive {
                    period: current,
                    status: period.status,
                })
            }
            None => {
                return Err(PeriodError::PeriodNotActive {
                    period: current,
                    status: PeriodStatus::Closed,
                })
            }
        }
        warn!("Period {} paused at block {}", current, current_block);
        Ok(())
    }

    /// Applies from the next period created
    pub fn set_period_duration(&mut self, caller: &Principal, blocks: u64) -> Result<(), PeriodError> {
        self.ensure_authority(caller)?;
        if blocks == 0 {
            return Err(PeriodError::InvalidParameter("period_duration"));
        }
        self.params.period_duration = blocks;
        info!("Period duration set to {} blocks", blocks);
        Ok(())
    }

    pub fn set_max_reading_delta(&mut self, caller: &Principal, delta: u64) -> Result<(), PeriodError> {
        self.ensure_authority(caller)?;
        if delta == 0 {
            return Err(PeriodError::InvalidParameter("max_reading_delta"));
        }
        self.params.max_reading_delta = delta;
        info!("Max reading delta set to {}", delta);
        Ok(())
    }

    /// True when one more verified submission fits the period counters
    pub(crate) fn can_record_submission(&self, id: PeriodId) -> bool {
        self.periods.get(&id).is_some_and(|period| {
            period.total_submissions.checked_add(1).is_some()
                && period.verified_count.checked_add(1).is_some()
        })
    }

    /// Counts one verified submission. Callers check `can_record_submission` first.
    pub(crate) fn record_submission(&mut self, id: PeriodId) {
        if let Some(period) = self.periods.get_mut(&id) {
            period.total_submissions = period.total_submissions.saturating_add(1);
            period.verified_count = period.verified_count.saturating_add(1);
        }
    }

    pub fn snapshot(&self) -> PeriodManagerSnapshot {
        PeriodManagerSnapshot {
            current: self.current,
            params: self.params,
            periods: self.periods.values().cloned().collect(),
        }
    }

    pub fn restore(authority: Principal, snapshot: PeriodManagerSnapshot) -> Self {
        Self {
            authority,
            params: snapshot.params,
            current: snapshot.current,
            periods: snapshot
                .periods
                .into_iter()
                .map(|period| (period.id, period))
                .collect(),
        }
    }
}

impl PeriodStatusSource for PeriodManager {
    fn get_period_status(&self, period: PeriodId) -> Option<PeriodStatus> {
        self.periods.get(&period).map(|p| p.status)
    }
}
