//! Proof verification and replay protection.
//!
//! [`ProofLedger::verify`] is the single mutating entry point: it checks a
//! submitted commitment/proof pair and, on success, records both the proof
//! hash and the (meter, nonce) pair so neither can be accepted again.

pub mod verifier;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::proof::{ENCRYPTED_READING_LEN, PUBLIC_KEY_LEN, ZK_PROOF_LEN};
use crate::models::{
    BlockHeight, NonceRecord, Principal, ProofHash, ProofRecord, ProofSubmission, PublicKey,
};
use crate::services::errors::{Categorized, ErrorCategory};

pub use verifier::{
    bind_proof, CommitmentBindingVerifier, PermissiveVerifier, ProofVerifier, VerificationInput,
    VerifierKind,
};

/// What a replayed submission collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReuseKind {
    /// Same (commitment, nonce, meter) hash already recorded
    Commitment,
    /// Same (meter, nonce) already consumed
    Nonce,
}

impl std::fmt::Display for ReuseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReuseKind::Commitment => write!(f, "commitment already verified"),
            ReuseKind::Nonce => write!(f, "nonce already used by this meter"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("malformed proof: {field} must be {expected} bytes, got {actual}")]
    MalformedProof {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("circuit mismatch: active circuit is {expected}, proof targets {actual}")]
    CircuitMismatch { expected: u32, actual: u32 },
    #[error("proof generated at block {generated_at} is not fresh at block {current_block} (max age {max_age})")]
    ProofExpired {
        generated_at: BlockHeight,
        current_block: BlockHeight,
        max_age: u64,
    },
    #[error("proof reused: {0}")]
    ProofReused(ReuseKind),
    #[error("proof verification failed")]
    VerificationFailed,
    #[error("caller is not the proof authority")]
    Unauthorized,
    #[error("public key must be {expected} bytes, got {actual}")]
    InvalidPublicKey { expected: usize, actual: usize },
    #[error("invalid parameter: {0} must be greater than zero")]
    InvalidParameter(&'static str),
}

impl Categorized for ProofError {
    fn category(&self) -> ErrorCategory {
        match self {
            ProofError::MalformedProof { .. }
            | ProofError::InvalidPublicKey { .. }
            | ProofError::InvalidParameter(_) => ErrorCategory::Validation,
            ProofError::CircuitMismatch { .. } | ProofError::VerificationFailed => {
                ErrorCategory::Integrity
            }
            ProofError::ProofExpired { .. } => ErrorCategory::Temporal,
            ProofError::ProofReused(_) => ErrorCategory::Conflict,
            ProofError::Unauthorized => ErrorCategory::Authorization,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ProofError::MalformedProof { .. } => "MALFORMED_PROOF",
            ProofError::CircuitMismatch { .. } => "CIRCUIT_MISMATCH",
            ProofError::ProofExpired { .. } => "PROOF_EXPIRED",
            ProofError::ProofReused(_) => "PROOF_REUSED",
            ProofError::VerificationFailed => "VERIFICATION_FAILED",
            ProofError::Unauthorized => "UNAUTHORIZED",
            ProofError::InvalidPublicKey { .. } => "INVALID_PUBLIC_KEY",
            ProofError::InvalidParameter(_) => "INVALID_PARAMETER",
        }
    }
}

/// Admin-tunable verification parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofParams {
    pub circuit_id: u32,
    /// Maximum blocks between proof generation and submission
    pub max_proof_age: u64,
    /// Blocks a recorded proof keeps reading as verified
    pub proof_validity_period: u64,
}

/// Persisted state of the proof ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofLedgerSnapshot {
    pub params: Option<ProofParams>,
    pub proofs: Vec<ProofRecord>,
    pub nonces: Vec<NonceRecord>,
    pub public_keys: Vec<(Principal, PublicKey)>,
}

/// Computes `SHA-256(encrypted_reading ∥ nonce ∥ submitter)`
pub fn proof_hash(encrypted_reading: &[u8], nonce: u64, submitter: &Principal) -> ProofHash {
    let mut hasher = Sha256::new();
    hasher.update(encrypted_reading);
    hasher.update(nonce.to_be_bytes());
    hasher.update(submitter.as_bytes());
    ProofHash(hasher.finalize().into())
}

pub struct ProofLedger {
    authority: Principal,
    params: ProofParams,
    verifier: Arc<dyn ProofVerifier>,
    proofs: HashMap<ProofHash, ProofRecord>,
    nonces: HashMap<(Principal, u64), NonceRecord>,
    public_keys: HashMap<Principal, PublicKey>,
}

impl std::fmt::Debug for ProofLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofLedger")
            .field("authority", &self.authority)
            .field("params", &self.params)
            .field("verifier", &self.verifier.name())
            .field("proofs", &self.proofs.len())
            .field("nonces", &self.nonces.len())
            .field("public_keys", &self.public_keys.len())
            .finish()
    }
}

impl ProofLedger {
    pub fn new(authority: Principal, params: ProofParams, verifier: Arc<dyn ProofVerifier>) -> Self {
        Self {
            authority,
            params,
            verifier,
            proofs: HashMap::new(),
            nonces: HashMap::new(),
            public_keys: HashMap::new(),
        }
    }

    pub fn params(&self) -> ProofParams {
        self.params
    }

    pub fn authority(&self) -> &Principal {
        &self.authority
    }

    /// Runs every check without recording anything.
    ///
    /// Order: shape, circuit, freshness, replay, predicate. The first
    /// failure wins.
    pub fn check(
        &self,
        submitter: &Principal,
        submission: &ProofSubmission,
        current_block: BlockHeight,
    ) -> Result<ProofHash, ProofError> {
        if submission.encrypted_reading.len() != ENCRYPTED_READING_LEN {
            return Err(ProofError::MalformedProof {
                field: "encrypted_reading",
                expected: ENCRYPTED_READING_LEN,
                actual: submission.encrypted_reading.len(),
            });
        }
        if submission.proof.len() != ZK_PROOF_LEN {
            return Err(ProofError::MalformedProof {
                field: "proof",
                expected: ZK_PROOF_LEN,
                actual: submission.proof.len(),
            });
        }

        if submission.circuit_id != self.params.circuit_id {
            return Err(ProofError::CircuitMismatch {
                expected: self.params.circuit_id,
                actual: submission.circuit_id,
            });
        }

        let fresh = current_block
            .checked_sub(submission.generated_at)
            .is_some_and(|age| age <= self.params.max_proof_age);
        if !fresh {
            return Err(ProofError::ProofExpired {
                generated_at: submission.generated_at,
                current_block,
                max_age: self.params.max_proof_age,
            });
        }

        let hash = proof_hash(&submission.encrypted_reading, submission.nonce, submitter);
        if self.proofs.contains_key(&hash) {
            return Err(ProofError::ProofReused(ReuseKind::Commitment));
        }
        if self
            .nonces
            .contains_key(&(submitter.clone(), submission.nonce))
        {
            return Err(ProofError::ProofReused(ReuseKind::Nonce));
        }

        let input = VerificationInput {
            circuit_id: submission.circuit_id,
            encrypted_reading: &submission.encrypted_reading,
            proof: &submission.proof,
            disclosed_reading: submission.disclosed_reading,
            public_key: self.public_keys.get(submitter),
        };
        if !self.verifier.verify(&input) {
            return Err(ProofError::VerificationFailed);
        }

        Ok(hash)
    }

    /// Checks a submission and records its proof hash and nonce.
    pub fn verify(
        &mut self,
        submitter: &Principal,
        submission: &ProofSubmission,
        current_block: BlockHeight,
    ) -> Result<ProofHash, ProofError> {
        let hash = match self.check(submitter, submission, current_block) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(
                    "Proof rejected for {} (nonce {}): {}",
                    submitter, submission.nonce, e
                );
                return Err(e);
            }
        };

        self.proofs.insert(
            hash,
            ProofRecord {
                proof_hash: hash,
                meter_id: submitter.clone(),
                reading: submission.disclosed_reading,
                verified_at: current_block,
            },
        );
        self.nonces.insert(
            (submitter.clone(), submission.nonce),
            NonceRecord {
                meter_id: submitter.clone(),
                nonce: submission.nonce,
                used_at: current_block,
            },
        );

        debug!(
            "Proof {} verified for {} at block {} ({})",
            hash,
            submitter,
            current_block,
            self.verifier.name()
        );
        Ok(hash)
    }

    /// Verifies each submission independently; earlier successes persist
    /// even when later elements fail.
    pub fn verify_batch(
        &mut self,
        submitter: &Principal,
        submissions: &[ProofSubmission],
        current_block: BlockHeight,
    ) -> Vec<Result<ProofHash, ProofError>> {
        submissions
            .iter()
            .map(|submission| self.verify(submitter, submission, current_block))
            .collect()
    }

    /// True while the proof is recorded and within its validity period
    pub fn is_proof_verified(&self, hash: &ProofHash, current_block: BlockHeight) -> bool {
        self.proofs.get(hash).is_some_and(|record| {
            current_block
                .checked_sub(record.verified_at)
                .is_some_and(|age| age <= self.params.proof_validity_period)
        })
    }

    pub fn proof_record(&self, hash: &ProofHash) -> Option<&ProofRecord> {
        self.proofs.get(hash)
    }

    pub fn is_nonce_used(&self, submitter: &Principal, nonce: u64) -> bool {
        self.nonces.contains_key(&(submitter.clone(), nonce))
    }

    pub fn public_key(&self, submitter: &Principal) -> Option<&PublicKey> {
        self.public_keys.get(submitter)
    }

    fn ensure_authority(&self, caller: &Principal) -> Result<(), ProofError> {
        if caller != &self.authority {
            warn!("Unauthorized proof ledger admin call by {}", caller);
            return Err(ProofError::Unauthorized);
        }
        Ok(())
    }

    /// Rotates the active circuit; proofs for the previous circuit stop verifying
    pub fn set_circuit_id(&mut self, caller: &Principal, circuit_id: u32) -> Result<(), ProofError> {
        self.ensure_authority(caller)?;
        info!(
            "Circuit rotated: {} -> {}",
            self.params.circuit_id, circuit_id
        );
        self.params.circuit_id = circuit_id;
        Ok(())
    }

    pub fn set_proof_validity_period(
        &mut self,
        caller: &Principal,
        blocks: u64,
    ) -> Result<(), ProofError> {
        self.ensure_authority(caller)?;
        if blocks == 0 {
            return Err(ProofError::InvalidParameter("proof_validity_period"));
        }
        self.params.proof_validity_period = blocks;
        info!("Proof validity period set to {} blocks", blocks);
        Ok(())
    }

    pub fn set_max_proof_age(&mut self, caller: &Principal, blocks: u64) -> Result<(), ProofError> {
        self.ensure_authority(caller)?;
        if blocks == 0 {
            return Err(ProofError::InvalidParameter("max_proof_age"));
        }
        self.params.max_proof_age = blocks;
        info!("Max proof age set to {} blocks", blocks);
        Ok(())
    }

    /// Registers (or replaces) the public key bound into a submitter's proofs
    pub fn register_public_key(
        &mut self,
        caller: &Principal,
        submitter: &Principal,
        key: Vec<u8>,
    ) -> Result<(), ProofError> {
        self.ensure_authority(caller)?;
        if key.len() != PUBLIC_KEY_LEN {
            return Err(ProofError::InvalidPublicKey {
                expected: PUBLIC_KEY_LEN,
                actual: key.len(),
            });
        }
        self.public_keys.insert(submitter.clone(), PublicKey(key));
        info!("Public key registered for {}", submitter);
        Ok(())
    }

    pub fn snapshot(&self) -> ProofLedgerSnapshot {
        let mut proofs: Vec<ProofRecord> = self.proofs.values().cloned().collect();
        proofs.sort_by(|a, b| a.proof_hash.cmp(&b.proof_hash));
        let mut nonces: Vec<NonceRecord> = self.nonces.values().cloned().collect();
        nonces.sort_by(|a, b| (&a.meter_id, a.nonce).cmp(&(&b.meter_id, b.nonce)));
        let mut public_keys: Vec<(Principal, PublicKey)> = self
            .public_keys
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        public_keys.sort_by(|a, b| a.0.cmp(&b.0));

        ProofLedgerSnapshot {
            params: Some(self.params),
            proofs,
            nonces,
            public_keys,
        }
    }

    /// Rebuilds the ledger from a snapshot. Parameters stored in the
    /// snapshot take precedence over `params`.
    pub fn restore(
        authority: Principal,
        params: ProofParams,
        verifier: Arc<dyn ProofVerifier>,
        snapshot: ProofLedgerSnapshot,
    ) -> Self {
        let mut ledger = Self::new(authority, snapshot.params.unwrap_or(params), verifier);
        ledger.proofs = snapshot
            .proofs
            .into_iter()
            .map(|record| (record.proof_hash, record))
            .collect();
        ledger.nonces = snapshot
            .nonces
            .into_iter()
            .map(|record| ((record.meter_id.clone(), record.nonce), record))
            .collect();
        ledger.public_keys = snapshot.public_keys.into_iter().collect();
        ledger
    }
}
