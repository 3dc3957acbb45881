//! Per-client rate limiting.
//!
//! Clients are keyed by caller ID when authenticated, by peer IP otherwise.
//! A bucket that has refilled to capacity carries no state worth keeping,
//! so idle buckets are swept every [`SWEEP_INTERVAL`] checks.

use axum::http::header::{self, HeaderValue};
use axum::http::StatusCode;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::pipeline::{Flow, Middleware, Next};
use crate::config::schema::RateLimitConfig;
use crate::http::request::RequestContext;
use crate::http::response::Response;

/// Checks between sweeps of idle buckets.
pub const SWEEP_INTERVAL: u64 = 1024;

/// A simple token bucket rate limiter.
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

    /// Take one token, or report how long until one is available.
    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else if refill_rate > 0.0 {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / refill_rate))
        } else {
            Err(Duration::MAX)
        }
    }

    /// Whether the bucket would be full at `now`.
    fn is_idle(&self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens + elapsed * refill_rate >= capacity
    }
}

pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    checks: AtomicU64,
    rps: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            checks: AtomicU64::new(0),
            rps: f64::from(config.requests_per_second),
            burst: f64::from(config.burst_size),
        }
    }

    pub fn check(&self, key: &str) -> Result<(), Duration> {
        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.evict_idle();
        }

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst));
        bucket.try_acquire(self.burst, self.rps)
    }

    /// Drop every bucket that has refilled to capacity. Returns how many went.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| !bucket.is_idle(now, self.burst, self.rps));
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.buckets.len(), "Evicted idle rate limit buckets");
        }
        evicted
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

impl Middleware for RateLimiter {
    fn handle<'a>(&'a self, req: &'a mut RequestContext, next: Next<'a>) -> BoxFuture<'a, Flow> {
        let key = req.client_key();
        let wait = match self.check(&key) {
            Ok(()) => return next.run(req),
            Err(wait) => wait,
        };

        tracing::warn!(request_id = %req.request_id, client = %key, "Rate limit exceeded");
        let retry_after = wait.as_secs_f64().ceil().clamp(1.0, 3600.0) as u64;
        let response = Response::text("Rate limit exceeded")
            .with_status(StatusCode::TOO_MANY_REQUESTS)
            .with_header(header::RETRY_AFTER, HeaderValue::from(retry_after));
        Box::pin(async move { Flow::Halt(response) })
    }
}
