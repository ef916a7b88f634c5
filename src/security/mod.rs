//! Security capabilities.
//!
//! # Data Flow
//! ```text
//! Incoming request (app middleware, insertion order):
//!     → rate_limit.rs (per-client token bucket, 429)
//!     → cors.rs (tower-http CorsLayer, preflight status)
//!     → session → csrf.rs (token check on unsafe methods, 403)
//!     → jwt.rs authenticate (bearer token → claims, 401)
//!     → handler (password.rs for credential checks)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a failed check answers with its envelope and stops the chain
//! - Each capability is behind its own cargo feature

#[cfg(feature = "cors")]
pub mod cors;
#[cfg(feature = "csrf")]
pub mod csrf;
#[cfg(feature = "jwt")]
pub mod jwt;
#[cfg(feature = "bcrypt")]
pub mod password;
#[cfg(feature = "rate-limit")]
pub mod rate_limit;
