//! Crate-level error type.
//!
//! Each subsystem owns its error enum; this type aggregates them for
//! bootstrap code that drives several subsystems at once.

use thiserror::Error;

use crate::app::AppError;
use crate::capability::CapabilityError;
use crate::config::ConfigError;
use crate::routing::RouteError;
#[cfg(feature = "session")]
use crate::session::SessionError;

/// Any error surfaced by the framework layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Application lifecycle error (uninitialized app, bind failure).
    #[error(transparent)]
    App(#[from] AppError),

    /// Route registration error.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Optional capability could not be resolved or configured.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session store failure.
    #[cfg(feature = "session")]
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Convenience alias used by bootstrap code.
pub type Result<T, E = Error> = std::result::Result<T, E>;
