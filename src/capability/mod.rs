//! Optional capabilities resolved by name.
//!
//! # Data Flow
//! ```text
//! PackageManager::install(capability, options)
//!     → CapabilityRegistry::resolve (static provider table)
//!         → provider deserializes options into the capability's config
//!         → Installed::{Middleware, SessionStore, PasswordHasher, TokenCodec, Upload}
//!     → middleware capabilities are appended to the app's middleware
//! ```
//!
//! # Design Decisions
//! - Providers are registered at compile time (cargo features) or by the
//!   caller with [`CapabilityRegistry::provide`]; nothing is looked up at
//!   runtime by reflection
//! - An unregistered capability is a `MissingDependency` error naming it

pub mod package_manager;
pub mod registry;

pub use package_manager::PackageManager;
pub use registry::{CapabilityRegistry, Installed, Provider};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every capability the package manager knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Session,
    Jwt,
    Bcrypt,
    Cors,
    Csrf,
    BodyParser,
    #[serde(alias = "multer")]
    Upload,
    MongoSessionStore,
    RateLimit,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::Session,
        Capability::Jwt,
        Capability::Bcrypt,
        Capability::Cors,
        Capability::Csrf,
        Capability::BodyParser,
        Capability::Upload,
        Capability::MongoSessionStore,
        Capability::RateLimit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Session => "session",
            Capability::Jwt => "jwt",
            Capability::Bcrypt => "bcrypt",
            Capability::Cors => "cors",
            Capability::Csrf => "csrf",
            Capability::BodyParser => "body-parser",
            Capability::Upload => "upload",
            Capability::MongoSessionStore => "mongo-session-store",
            Capability::RateLimit => "rate-limit",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        if name == "multer" {
            return Ok(Capability::Upload);
        }
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| CapabilityError::Unknown(s.to_string()))
    }
}

/// Errors raised while resolving or using a capability.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// No provider is registered for the capability.
    #[error(
        "missing optional dependency `{capability}`: \
         enable its cargo feature or register a provider for it"
    )]
    MissingDependency { capability: Capability },

    #[error("unknown capability `{0}`")]
    Unknown(String),

    #[error("invalid options for `{capability}`: {source}")]
    InvalidOptions {
        capability: Capability,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid `{capability}` configuration: {reason}")]
    InvalidConfig { capability: Capability, reason: String },

    /// A provider returned a different kind than the caller asked for.
    #[error("provider for `{capability}` returned an unexpected kind")]
    Mismatch { capability: Capability },

    #[cfg(feature = "bcrypt")]
    #[error(transparent)]
    Hash(#[from] bcrypt::BcryptError),

    #[cfg(feature = "jwt")]
    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for capability in Capability::ALL {
            assert_eq!(capability.as_str().parse::<Capability>().unwrap(), capability);
            let json = serde_json::to_value(capability).unwrap();
            assert_eq!(json, capability.as_str());
        }
        assert_eq!("multer".parse::<Capability>().unwrap(), Capability::Upload);
        assert!(matches!("redis".parse::<Capability>(), Err(CapabilityError::Unknown(_))));
    }

    #[test]
    fn test_missing_dependency_names_capability() {
        let err = CapabilityError::MissingDependency {
            capability: Capability::MongoSessionStore,
        };
        assert!(err.to_string().contains("mongo-session-store"));
    }
}
