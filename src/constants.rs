//! Ledger constants and default parameter values.
//!
//! This module centralizes fixed wire sizes and the defaults used when
//! configuration does not override them.

/// Fixed sizes of proof material
pub mod proof {
    /// Length of an encrypted reading commitment in bytes
    pub const ENCRYPTED_READING_LEN: usize = 64;

    /// Length of a proof blob in bytes
    pub const ZK_PROOF_LEN: usize = 128;

    /// Length of a submitter public key (compressed curve point)
    pub const PUBLIC_KEY_LEN: usize = 33;

    /// Domain separator mixed into commitment bindings
    pub const BINDING_DOMAIN: &[u8] = b"meter-ledger/v1";

    /// Leading bytes of the proof blob that carry the binding digest
    pub const BINDING_DIGEST_LEN: usize = 32;
}

/// Identity limits
pub mod identity {
    /// Maximum length of a principal string
    pub const MAX_PRINCIPAL_LEN: usize = 128;
}

/// Default ledger parameters (block-denominated unless stated otherwise)
pub mod defaults {
    /// Active circuit id at genesis
    pub const CIRCUIT_ID: u32 = 1;

    /// Oldest proof accepted, measured from its generation block (~1 day of 10-minute blocks)
    pub const MAX_PROOF_AGE: u64 = 144;

    /// How long a recorded proof reads as verified (~1 week)
    pub const PROOF_VALIDITY_PERIOD: u64 = 1_008;

    /// Advisory period window (~30 days)
    pub const PERIOD_DURATION: u64 = 4_320;

    /// Largest reading increase accepted in a single period
    pub const MAX_READING_DELTA: u64 = 1_000_000;

    /// Fallback tariff per unit of usage
    pub const GLOBAL_RATE: u64 = 100;

    /// Default HTTP port
    pub const PORT: u16 = 8080;
}

/// HTTP header names
pub mod headers {
    /// Operator API key header
    pub const API_KEY: &str = "X-API-Key";

    /// Calling meter principal header
    pub const PRINCIPAL: &str = "X-Ledger-Principal";
}
