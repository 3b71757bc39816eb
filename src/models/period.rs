use serde::{Deserialize, Serialize};

use super::{BlockHeight, PeriodId};

/// Lifecycle status of a billing period
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    /// Accepting submissions
    Active,
    /// Terminal for submissions, eligible for billing
    Closed,
    /// Emergency halt; terminal for submissions, not billable until closed
    Paused,
}

impl std::fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodStatus::Active => write!(f, "active"),
            PeriodStatus::Closed => write!(f, "closed"),
            PeriodStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Metadata of one billing period.
///
/// `start_block`/`end_block` are advisory; submissions are gated by
/// `status`, not by the block window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: PeriodId,
    pub start_block: BlockHeight,
    pub end_block: BlockHeight,
    pub total_submissions: u64,
    pub verified_count: u64,
    pub status: PeriodStatus,
}

impl Period {
    pub fn open(id: PeriodId, start_block: BlockHeight, duration: u64) -> Self {
        Self {
            id,
            start_block,
            end_block: start_block.saturating_add(duration),
            total_submissions: 0,
            verified_count: 0,
            status: PeriodStatus::Active,
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.status == PeriodStatus::Active
    }
}
