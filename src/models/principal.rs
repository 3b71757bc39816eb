use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::identity::MAX_PRINCIPAL_LEN;

/// Opaque identity of a meter, operator or collaborator.
///
/// The ledger never interprets the contents; it only compares principals
/// for equality (authority gating, meter ownership) and hashes their bytes
/// into proof commitments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Principal(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalError {
    #[error("principal must not be empty")]
    Empty,
    #[error("principal exceeds {max} characters (got {len})")]
    TooLong { len: usize, max: usize },
}

impl Principal {
    pub fn new(value: impl Into<String>) -> Result<Self, PrincipalError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PrincipalError::Empty);
        }
        if trimmed.len() > MAX_PRINCIPAL_LEN {
            return Err(PrincipalError::TooLong {
                len: trimmed.len(),
                max: MAX_PRINCIPAL_LEN,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for Principal {
    type Error = PrincipalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Principal::new(value)
    }
}

impl std::str::FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Principal::new(s)
    }
}

impl From<Principal> for String {
    fn from(principal: Principal) -> Self {
        principal.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
