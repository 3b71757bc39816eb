use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{BlockHeight, PeriodId, Principal};

/// SHA-256 digest identifying a verified commitment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProofHash(pub [u8; 32]);

impl ProofHash {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(value: &str) -> Result<Self, hex::FromHexError> {
        let trimmed = value.strip_prefix("0x").unwrap_or(value);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(trimmed, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for ProofHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ProofHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ProofHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        ProofHash::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Everything a meter hands over to have one reading's proof checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSubmission {
    #[serde(with = "super::hex_bytes")]
    pub encrypted_reading: Vec<u8>,
    #[serde(with = "super::hex_bytes")]
    pub proof: Vec<u8>,
    pub nonce: u64,
    pub disclosed_reading: u64,
    pub circuit_id: u32,
    /// Block at which the proof was generated; freshness is measured from here
    pub generated_at: BlockHeight,
}

/// Immutable record of a verified commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub proof_hash: ProofHash,
    pub meter_id: Principal,
    pub reading: u64,
    pub verified_at: BlockHeight,
}

/// Marks a (meter, nonce) pair as consumed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceRecord {
    pub meter_id: Principal,
    pub nonce: u64,
    pub used_at: BlockHeight,
}

/// Fixed-length public key registered for a submitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "super::hex_bytes")] pub Vec<u8>);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Append-only usage submission for one (meter, period)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub meter_id: Principal,
    pub period: PeriodId,
    #[serde(with = "super::hex_bytes")]
    pub encrypted_reading: Vec<u8>,
    #[serde(with = "super::hex_bytes")]
    pub zk_proof: Vec<u8>,
    pub proof_hash: ProofHash,
    pub submitted_at: BlockHeight,
    pub verified: bool,
    /// Disclosed plaintext reading, retained for billing
    pub reading_value: u64,
}

/// Returned to a meter whose reading was accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub meter_id: Principal,
    pub period: PeriodId,
    pub proof_hash: ProofHash,
    pub reading_value: u64,
}

/// Collaborator-facing answer to `get_submission`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmissionView {
    pub reading_value: u64,
}
