//! Route and middleware composition.
//!
//! # Data Flow
//! ```text
//! RouteManager (base path + middleware chain)
//!     → verb call: chain wraps handler once
//!     → RouterCell (conflict index + axum Router)
//!     → group(prefix): child cell nested under prefix
//!     → attach_to(app): cell merged into the application router
//!
//! RouteHandler (one path, bound target)
//!     → verb call / apply_callbacks(CallbackSpec)
//!     → target RouterCell
//! ```
//!
//! # Design Decisions
//! - Registration happens during setup; conflicts are `RouteError`s, never
//!   axum panics
//! - Each verb call registers exactly once, whatever the chain length
//! - Express-style paths (`:id`, `*`) are normalized to axum syntax

mod cell;
pub mod descriptor;
pub mod handler;
pub mod manager;
pub mod middleware;
pub mod path;

pub(crate) use cell::RouterCell;
pub use descriptor::{RouteDescriptor, Verb};
pub use handler::{CallbackSpec, RouteHandler, RouteTarget};
pub use manager::RouteManager;
pub use middleware::Middleware;

use thiserror::Error;

/// Errors raised while registering or mounting routes.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A verb was registered before `set_route`.
    #[error("route path has not been set; call `set_route` before registering a verb")]
    RouteNotSet,

    /// A route handler has no target router.
    #[error("route handler for `{path}` is not bound to a target")]
    TargetNotBound { path: String },

    /// The same verb is already registered on the path.
    #[error("route `{verb} {path}` is already registered")]
    Conflict { verb: Verb, path: String },

    /// The path overlaps an existing path with different parameter names.
    #[error("route `{path}` conflicts with existing route `{existing}`")]
    PathConflict { path: String, existing: String },

    #[error("invalid route path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid callback spec: {0}")]
    InvalidCallbackSpec(String),
}
