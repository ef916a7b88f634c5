//! Password hashing capability (bcrypt).

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilityError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BcryptConfig {
    pub cost: u32,
}

impl Default for BcryptConfig {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Hashes and verifies passwords.
///
/// Both operations are CPU bound; call them from `spawn_blocking` on hot
/// paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(config: BcryptConfig) -> Result<Self, CapabilityError> {
        if !(4..=31).contains(&config.cost) {
            return Err(CapabilityError::InvalidConfig {
                capability: Capability::Bcrypt,
                reason: format!("cost must be between 4 and 31, got {}", config.cost),
            });
        }
        Ok(Self { cost: config.cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, password: &str) -> Result<String, CapabilityError> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, CapabilityError> {
        Ok(bcrypt::verify(password, hash)?)
    }
}
