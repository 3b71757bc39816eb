pub mod admin;
pub mod billing;
pub mod extractors;
pub mod health;
pub mod meters;
pub mod periods;
pub mod proofs;
pub mod response;
pub mod submissions;

// Re-export commonly used types
pub use extractors::{meter_principal, BlockRequest};
pub use response::{ApiResponse, Created, ListResponse};
