// Ledger data model
// Records owned by the core components plus the identifiers they are keyed by.

pub mod billing;
pub mod hex_bytes;
pub mod meter;
pub mod period;
pub mod principal;
pub mod proof;

pub use billing::{
    Bill, BillAmount, PeriodTotals, RateSource, ResolvedRate, SettlementSummary,
};
pub use meter::{Meter, MeterInfo, MeterView};
pub use period::{Period, PeriodStatus};
pub use principal::{Principal, PrincipalError};
pub use proof::{
    NonceRecord, ProofHash, ProofRecord, ProofSubmission, PublicKey, Submission, SubmissionReceipt,
    SubmissionView,
};

/// Sequential billing period number, genesis = 0
pub type PeriodId = u64;

/// Group of meters sharing a tariff
pub type SettlementId = u64;

/// Host block height
pub type BlockHeight = u64;
