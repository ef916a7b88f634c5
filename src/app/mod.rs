//! Application context.
//!
//! # Data Flow
//! ```text
//! AppRegistry::init()
//!     → AppHandle (router cell + app middleware)
//!     → PackageManager / RouteManager / RouteHandler register into it
//!     → AppRegistry::listen() / launch() / serve()
//!     → HttpServer (timeout, request id, trace layers)
//! ```
//!
//! # Design Decisions
//! - The registry is an explicit context object, not a process global
//! - At most one active handle per registry; `init` replaces it
//! - Every operation needing the handle fails with `NotInitialized` when absent

pub mod handle;
pub mod registry;

pub use handle::AppHandle;
pub use registry::{AppRegistry, LaunchOptions};

use thiserror::Error;

/// Errors raised by the application registry.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Express app has not been initialized yet.")]
    NotInitialized,

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}
