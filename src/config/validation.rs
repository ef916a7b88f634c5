//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0) and log filter syntax
//! - Check capability names and their ordering constraints
//! - Detect invalid and duplicate routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::capability::Capability;
use crate::config::schema::AppConfig;
use crate::routing::{path, Verb};

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.request_timeout_secs must be greater than 0")]
    ZeroTimeout,

    #[error("invalid logging.level `{level}`: {reason}")]
    InvalidLogLevel { level: String, reason: String },

    #[error("unknown capability `{0}`")]
    UnknownCapability(String),

    #[error("capability `{0}` is enabled more than once")]
    DuplicateCapability(Capability),

    #[error("capability `{dependent}` requires `{required}` to be enabled with a lower order")]
    CapabilityOrder { dependent: Capability, required: Capability },

    #[error("route `{method} {path}`: {reason}")]
    InvalidRoute { method: Verb, path: String, reason: String },

    #[error("route `{method} {path}` is defined more than once")]
    DuplicateRoute { method: Verb, path: String },
}

/// Validate `config`, collecting every error.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&config.logging.level) {
        errors.push(ValidationError::InvalidLogLevel {
            level: config.logging.level.clone(),
            reason: e.to_string(),
        });
    }

    validate_capabilities(config, &mut errors);
    validate_routes(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_capabilities(config: &AppConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    let mut enabled = Vec::new();

    for entry in config.capabilities.iter().filter(|e| e.enabled) {
        match entry.name.parse::<Capability>() {
            Ok(capability) => {
                if !seen.insert(capability) {
                    errors.push(ValidationError::DuplicateCapability(capability));
                }
                enabled.push((capability, entry.order));
            }
            Err(_) => errors.push(ValidationError::UnknownCapability(entry.name.clone())),
        }
    }

    // The CSRF token lives in the session.
    let order_of = |wanted: Capability| enabled.iter().find(|(c, _)| *c == wanted).map(|(_, o)| *o);
    if let Some(csrf) = order_of(Capability::Csrf) {
        if !order_of(Capability::Session).is_some_and(|session| session < csrf) {
            errors.push(ValidationError::CapabilityOrder {
                dependent: Capability::Csrf,
                required: Capability::Session,
            });
        }
    }
}

fn validate_routes(config: &AppConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    // Same path tree axum builds; catches param/wildcard overlaps.
    let mut matcher = matchit::Router::new();
    let mut paths = HashSet::new();

    for route in &config.routes {
        let normalized = match path::normalize(&route.path) {
            Ok(p) => p,
            Err(e) => {
                errors.push(ValidationError::InvalidRoute {
                    method: route.method,
                    path: route.path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if let Err(e) = route.spec.validate() {
            errors.push(ValidationError::InvalidRoute {
                method: route.method,
                path: route.path.clone(),
                reason: e.to_string(),
            });
        }

        if !paths.contains(&normalized) {
            match matcher.insert(normalized.as_str(), ()) {
                Ok(()) => {
                    paths.insert(normalized.clone());
                }
                Err(e) => {
                    errors.push(ValidationError::InvalidRoute {
                        method: route.method,
                        path: route.path.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            }
        }

        let after_all = seen.contains(&(Verb::All, normalized.clone()));
        if !seen.insert((route.method, normalized)) || after_all {
            errors.push(ValidationError::DuplicateRoute {
                method: route.method,
                path: route.path.clone(),
            });
        }
    }
}
