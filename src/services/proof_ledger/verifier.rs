//! Pluggable proof predicates.
//!
//! The ledger only fixes the verification *protocol* (shape, circuit,
//! freshness, replay); whether a proof blob actually attests the disclosed
//! reading is decided by a [`ProofVerifier`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::proof::{BINDING_DIGEST_LEN, BINDING_DOMAIN, ZK_PROOF_LEN};
use crate::models::PublicKey;

/// Inputs handed to the predicate once the protocol checks have passed
#[derive(Debug, Clone, Copy)]
pub struct VerificationInput<'a> {
    pub circuit_id: u32,
    pub encrypted_reading: &'a [u8],
    pub proof: &'a [u8],
    pub disclosed_reading: u64,
    /// Key registered for the submitter, if any
    pub public_key: Option<&'a PublicKey>,
}

pub trait ProofVerifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn verify(&self, input: &VerificationInput<'_>) -> bool;
}

/// Requires the proof to open the commitment to the disclosed reading.
///
/// The leading [`BINDING_DIGEST_LEN`] bytes of the proof must equal
/// `SHA-256(domain ∥ circuit_id ∥ encrypted_reading ∥ disclosed_reading ∥ public_key)`,
/// with the key omitted when none is registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitmentBindingVerifier;

impl ProofVerifier for CommitmentBindingVerifier {
    fn name(&self) -> &'static str {
        "commitment-binding"
    }

    fn verify(&self, input: &VerificationInput<'_>) -> bool {
        if input.proof.len() < BINDING_DIGEST_LEN {
            return false;
        }
        let expected = binding_digest(
            input.circuit_id,
            input.encrypted_reading,
            input.disclosed_reading,
            input.public_key.map(PublicKey::as_bytes),
        );
        input.proof[..BINDING_DIGEST_LEN] == expected
    }
}

/// Accepts every proof. Development and load-testing only.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveVerifier;

impl ProofVerifier for PermissiveVerifier {
    fn name(&self) -> &'static str {
        "permissive"
    }

    fn verify(&self, _input: &VerificationInput<'_>) -> bool {
        true
    }
}

/// Verifier selection carried in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifierKind {
    Binding,
    Permissive,
}

impl VerifierKind {
    pub fn build(&self) -> Arc<dyn ProofVerifier> {
        match self {
            VerifierKind::Binding => Arc::new(CommitmentBindingVerifier),
            VerifierKind::Permissive => Arc::new(PermissiveVerifier),
        }
    }
}

impl std::str::FromStr for VerifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binding" => Ok(VerifierKind::Binding),
            "permissive" => Ok(VerifierKind::Permissive),
            _ => Err(format!("Invalid verifier kind: {}", s)),
        }
    }
}

fn binding_digest(
    circuit_id: u32,
    encrypted_reading: &[u8],
    disclosed_reading: u64,
    public_key: Option<&[u8]>,
) -> [u8; BINDING_DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(BINDING_DOMAIN);
    hasher.update(circuit_id.to_be_bytes());
    hasher.update(encrypted_reading);
    hasher.update(disclosed_reading.to_be_bytes());
    if let Some(key) = public_key {
        hasher.update(key);
    }
    hasher.finalize().into()
}

/// Builds a proof blob accepted by [`CommitmentBindingVerifier`].
///
/// Prover-side helper; the trailing bytes after the digest are zero.
pub fn bind_proof(
    circuit_id: u32,
    encrypted_reading: &[u8],
    disclosed_reading: u64,
    public_key: Option<&[u8]>,
) -> Vec<u8> {
    let mut proof = vec![0u8; ZK_PROOF_LEN];
    let digest = binding_digest(circuit_id, encrypted_reading, disclosed_reading, public_key);
    proof[..BINDING_DIGEST_LEN].copy_from_slice(&digest);
    proof
}
