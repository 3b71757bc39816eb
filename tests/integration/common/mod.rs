// Shared fixtures for the integration tests

#![allow(dead_code)]

use meter_ledger::config::LedgerConfig;
use meter_ledger::constants::proof::ENCRYPTED_READING_LEN;
use meter_ledger::models::{BlockHeight, Principal, ProofSubmission};
use meter_ledger::services::proof_ledger::bind_proof;
use meter_ledger::services::{Authorities, Ledger, LedgerService};

pub const OPERATOR: &str = "operator";

pub fn principal(name: &str) -> Principal {
    Principal::new(name).expect("valid principal")
}

pub fn operator() -> Principal {
    principal(OPERATOR)
}

pub fn new_ledger(config: &LedgerConfig) -> Ledger {
    Ledger::new(config, Authorities::single(operator())).expect("valid ledger config")
}

pub fn new_service() -> LedgerService {
    LedgerService::new(new_ledger(&LedgerConfig::default()))
}

/// Commitment that differs per (meter, nonce) so proof hashes never collide by accident
pub fn commitment(meter: &Principal, nonce: u64) -> Vec<u8> {
    let mut bytes = vec![0u8; ENCRYPTED_READING_LEN];
    for (slot, byte) in bytes.iter_mut().zip(meter.as_bytes()) {
        *slot = *byte;
    }
    bytes[ENCRYPTED_READING_LEN - 8..].copy_from_slice(&nonce.to_be_bytes());
    bytes
}

/// A submission the default binding verifier accepts
pub fn reading(
    meter: &Principal,
    nonce: u64,
    value: u64,
    generated_at: BlockHeight,
) -> ProofSubmission {
    let encrypted_reading = commitment(meter, nonce);
    ProofSubmission {
        proof: bind_proof(1, &encrypted_reading, value, None),
        encrypted_reading,
        nonce,
        disclosed_reading: value,
        circuit_id: 1,
        generated_at,
    }
}
