//! Cookie-backed sessions.
//!
//! # Data Flow
//! ```text
//! request cookie `sid`
//!     → SessionStore::load (memory, or a provided external store)
//!     → Session handle in request extensions
//!     → handler reads/writes through the `Session` extractor
//!     → modified: SessionStore::store + Set-Cookie for new sessions
//!     → destroyed: SessionStore::destroy + expired cookie
//! ```
//!
//! # Design Decisions
//! - Unmodified new sessions are never stored and get no cookie
//! - Session ids are uuid v4
//! - Cookie attributes come verbatim from [`SessionConfig::cookie`]

mod handle;
pub mod middleware;
pub mod store;

pub use handle::Session;
pub use middleware::session;
pub use store::{MemorySessionStore, SessionStore};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::CookieOptions;

/// Data kept per session.
pub type SessionData = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store error: {0}")]
    Store(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie: CookieOptions,
    /// Server-side lifetime; falls back to `cookie.max_age`, then to
    /// [`SessionConfig::DEFAULT_TTL_SECS`].
    pub ttl_secs: Option<u64>,
    /// `memory`, or `mongo` for the external `mongo-session-store` capability.
    pub store: String,
    /// Passed verbatim to the external store capability (e.g. `{ uri = "mongodb://..." }`).
    pub store_options: serde_json::Value,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sid".to_string(),
            cookie: CookieOptions::default(),
            ttl_secs: None,
            store: "memory".to_string(),
            store_options: serde_json::Value::Null,
        }
    }
}

impl SessionConfig {
    /// One day.
    pub const DEFAULT_TTL_SECS: u64 = 86_400;

    pub(crate) fn ttl(&self) -> std::time::Duration {
        let secs = self
            .ttl_secs
            .or_else(|| self.cookie.max_age.and_then(|secs| u64::try_from(secs).ok()))
            .unwrap_or(Self::DEFAULT_TTL_SECS);
        std::time::Duration::from_secs(secs)
    }
}
