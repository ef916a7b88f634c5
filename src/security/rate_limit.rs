//! Rate limiting capability.
//!
//! One token bucket per client address. Clients are keyed by the peer
//! address, or by the first `X-Forwarded-For` hop when `trust_proxy` is set;
//! requests with neither share the `unknown` bucket. Buckets idle long
//! enough to have refilled are pruned, since a fresh bucket is identical.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::http::request::{client_ip, peer_ip};
use crate::http::ApiResponse;
use crate::routing::Middleware;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst_size: u32,
    /// Key clients by `X-Forwarded-For`. Only safe behind a proxy that
    /// overwrites the header; otherwise clients pick their own bucket.
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst_size: 20,
            trust_proxy: false,
        }
    }
}

/// Checks between two pruning passes.
const PRUNE_EVERY: u64 = 1024;

/// A simple token bucket.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    /// Whether the bucket would be full again at `now`.
    fn is_full(&self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens + elapsed * refill_rate >= capacity
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Buckets for every client seen so far.
pub struct RateLimiterState {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    checks: AtomicU64,
    config: RateLimitConfig,
}

impl RateLimiterState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            checks: AtomicU64::new(0),
            config,
        }
    }

    /// Take one token for `key`.
    pub fn check(&self, key: &str) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }

        let burst = f64::from(self.config.burst_size);
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(burst));

        bucket.try_acquire(burst, self.config.requests_per_second)
    }

    /// Drop buckets that have refilled; returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let burst = f64::from(self.config.burst_size);
        let rate = self.config.requests_per_second;
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_full(now, burst, rate));
        before - buckets.len()
    }

    /// Number of clients with a bucket.
    pub fn clients(&self) -> usize {
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

/// Rate limiting middleware; exhausted clients get the 429 envelope.
pub fn rate_limit(config: RateLimitConfig) -> Middleware {
    let state = Arc::new(RateLimiterState::new(config));
    Middleware::from_fn("rate-limit", move |req: Request, next: Next| {
        let state = Arc::clone(&state);
        async move {
            let ip = if state.config.trust_proxy {
                client_ip(req.headers(), req.extensions())
            } else {
                peer_ip(req.extensions())
            };
            let key = ip.map_or_else(|| "unknown".to_string(), |ip| ip.to_string());

            if state.check(&key) {
                next.run(req).await
            } else {
                tracing::warn!(client = %key, "Rate limit exceeded");
                let mut response: Response = ApiResponse::RateLimitExceeded.into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
                response
            }
        }
    })
}
