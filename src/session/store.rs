//! Session storage backends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{SessionData, SessionError};

/// Where session data lives between requests.
///
/// External stores (e.g. MongoDB) implement this trait and are registered as
/// the `mongo-session-store` capability.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError>;

    async fn store(
        &self,
        id: &str,
        data: SessionData,
        ttl: Option<Duration>,
    ) -> Result<(), SessionError>;

    async fn destroy(&self, id: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Clone)]
struct Entry {
    data: SessionData,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Writes between two sweeps of expired entries.
const SWEEP_EVERY: u64 = 256;

/// In-process store. Expired entries are dropped when next loaded, and
/// swept from the whole map every [`SWEEP_EVERY`] writes.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<DashMap<String, Entry>>,
    writes: Arc<AtomicU64>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| !entry.expired(now));
        let removed = before.saturating_sub(self.inner.len());
        if removed > 0 {
            tracing::debug!(removed, "Swept expired sessions");
        }
        removed
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        match self.inner.get(id) {
            None => return Ok(None),
            Some(entry) if !entry.expired(Instant::now()) => return Ok(Some(entry.data.clone())),
            Some(_) => {}
        }
        self.inner.remove(id);
        Ok(None)
    }

    async fn store(
        &self,
        id: &str,
        data: SessionData,
        ttl: Option<Duration>,
    ) -> Result<(), SessionError> {
        // A lifetime past what `Instant` can represent never expires.
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.inner.insert(id.to_string(), Entry { data, expires_at });
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        self.inner.remove(id);
        Ok(())
    }
}
