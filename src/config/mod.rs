use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::constants::defaults;
use crate::models::Principal;

pub mod ledger;
pub use ledger::{ConfigError, LedgerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: String,
    pub port: u16,
    pub log_level: String,
    /// Shared secret identifying operator calls (`X-API-Key`)
    pub operator_api_key: String,
    /// Identity holding every admin capability
    pub authority: Principal,
    /// Where the ledger snapshot is loaded from and saved to, if anywhere
    pub snapshot_path: Option<PathBuf>,
    /// Periodic snapshot interval; 0 saves only at shutdown
    pub snapshot_interval_secs: u64,
    pub ledger: LedgerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let operator_api_key = env::var("LEDGER_OPERATOR_API_KEY")
            .map_err(|_| ConfigError::Missing("LEDGER_OPERATOR_API_KEY"))?;
        if operator_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "LEDGER_OPERATOR_API_KEY",
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        let authority = env::var("LEDGER_AUTHORITY")
            .map_err(|_| ConfigError::Missing("LEDGER_AUTHORITY"))?
            .parse::<Principal>()
            .map_err(|e| ConfigError::Invalid {
                name: "LEDGER_AUTHORITY",
                reason: e.to_string(),
            })?;

        Ok(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| defaults::PORT.to_string())
                .parse()?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            operator_api_key,
            authority,
            snapshot_path: env::var("LEDGER_SNAPSHOT_PATH")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            snapshot_interval_secs: env::var("LEDGER_SNAPSHOT_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0),
            ledger: LedgerConfig::from_env()?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
