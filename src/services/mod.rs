// Core ledger services
// One module per component, plus the composite ledger and its async facade.

pub mod billing;
pub mod errors;
pub mod ledger;
pub mod ledger_service;
pub mod meter_registry;
pub mod period_manager;
pub mod proof_ledger;
pub mod rate_table;
pub mod submission_pipeline;

pub use billing::{BatchOutcome, BillError, BillingEngine, PayError};
pub use errors::{Categorized, ErrorCategory, LedgerError, LedgerResult};
pub use ledger::{Authorities, Ledger, LedgerSnapshot, SnapshotError};
pub use ledger_service::LedgerService;
pub use meter_registry::{MeterRegistry, RegistryError};
pub use period_manager::{PeriodError, PeriodManager, PeriodParams};
pub use proof_ledger::{ProofError, ProofLedger, ProofParams, ProofVerifier, VerifierKind};
pub use rate_table::{RateError, RateTable};
pub use submission_pipeline::{SubmissionPipeline, SubmitError};
