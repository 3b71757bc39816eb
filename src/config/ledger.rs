use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use tracing::{info, warn};

use crate::constants::defaults;
use crate::services::proof_ledger::{ProofParams, VerifierKind};
use crate::services::period_manager::PeriodParams;

/// Tunable ledger parameters, all block-denominated except rates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Active proof circuit (default: 1)
    pub circuit_id: u32,

    /// Oldest accepted proof, in blocks since generation (default: 144)
    pub max_proof_age: u64,

    /// How long a recorded proof reads as verified (default: 1008)
    pub proof_validity_period: u64,

    /// Advisory period length (default: 4320)
    pub period_duration: u64,

    /// Largest reading increase per submission (default: 1,000,000)
    pub max_reading_delta: u64,

    /// Fallback tariff per unit (default: 100)
    pub global_rate: u64,

    /// Start block of genesis period 0 (default: 0)
    pub genesis_block: u64,

    /// Proof predicate (default: binding)
    pub verifier: VerifierKind,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            circuit_id: defaults::CIRCUIT_ID,
            max_proof_age: defaults::MAX_PROOF_AGE,
            proof_validity_period: defaults::PROOF_VALIDITY_PERIOD,
            period_duration: defaults::PERIOD_DURATION,
            max_reading_delta: defaults::MAX_READING_DELTA,
            global_rate: defaults::GLOBAL_RATE,
            genesis_block: 0,
            verifier: VerifierKind::Binding,
        }
    }
}

/// Reads `name`, keeping `current` when unset or unparsable.
fn override_from_env<T>(name: &str, current: T, accept: impl Fn(&T) -> bool) -> T
where
    T: FromStr + std::fmt::Display,
{
    let Ok(val) = env::var(name) else {
        return current;
    };
    match val.parse::<T>() {
        Ok(parsed) if accept(&parsed) => {
            info!("Using custom {}: {}", name, parsed);
            parsed
        }
        Ok(_) => {
            warn!("Invalid {}: {}, using default {}", name, val, current);
            current
        }
        Err(_) => {
            warn!("Failed to parse {}: {}, using default {}", name, val, current);
            current
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Result<Self> {
        let base = Self::default();
        let positive = |v: &u64| *v > 0;

        let config = Self {
            circuit_id: override_from_env("LEDGER_CIRCUIT_ID", base.circuit_id, |_| true),
            max_proof_age: override_from_env("LEDGER_MAX_PROOF_AGE", base.max_proof_age, positive),
            proof_validity_period: override_from_env(
                "LEDGER_PROOF_VALIDITY_PERIOD",
                base.proof_validity_period,
                positive,
            ),
            period_duration: override_from_env(
                "LEDGER_PERIOD_DURATION",
                base.period_duration,
                positive,
            ),
            max_reading_delta: override_from_env(
                "LEDGER_MAX_READING_DELTA",
                base.max_reading_delta,
                positive,
            ),
            global_rate: override_from_env("LEDGER_GLOBAL_RATE", base.global_rate, positive),
            genesis_block: override_from_env("LEDGER_GENESIS_BLOCK", base.genesis_block, |_| true),
            verifier: match env::var("LEDGER_VERIFIER") {
                Ok(val) => val.parse().unwrap_or_else(|e| {
                    warn!("{}, using binding verifier", e);
                    VerifierKind::Binding
                }),
                Err(_) => base.verifier,
            },
        };

        if config.verifier == VerifierKind::Permissive {
            warn!("⚠️ Permissive proof verifier enabled: every proof is accepted");
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("max_proof_age", self.max_proof_age),
            ("proof_validity_period", self.proof_validity_period),
            ("period_duration", self.period_duration),
            ("max_reading_delta", self.max_reading_delta),
            ("global_rate", self.global_rate),
        ];
        for (name, value) in required {
            if value == 0 {
                return Err(ConfigError::MustBePositive(name));
            }
        }
        Ok(())
    }

    pub fn proof_params(&self) -> ProofParams {
        ProofParams {
            circuit_id: self.circuit_id,
            max_proof_age: self.max_proof_age,
            proof_validity_period: self.proof_validity_period,
        }
    }

    pub fn period_params(&self) -> PeriodParams {
        PeriodParams {
            period_duration: self.period_duration,
            max_reading_delta: self.max_reading_delta,
        }
    }
}

/// Errors that can occur while validating configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
