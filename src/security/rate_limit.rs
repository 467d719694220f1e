//! Fixed-window rate limiting per identity.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::clock::{Clock, SystemClock};
use crate::config::{RateLimitConfig, ShieldConfig};
use crate::lifecycle::Singleton;
use crate::observability::metrics;

/// Identity used when the caller supplies none.
pub const ANONYMOUS: &str = "anonymous";

/// Request counter for one identity.
#[derive(Debug, Clone)]
pub struct RateBucket {
    pub identity: String,
    pub window_start: Instant,
    pub count: u32,
    pub limit: u32,
    pub window: Duration,
}

impl RateBucket {
    fn new(identity: &str, now: Instant, limit: u32, window: Duration) -> Self {
        Self {
            identity: identity.to_string(),
            window_start: now,
            count: 0,
            limit,
            window,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.window_start) >= self.window
    }

    fn roll(&mut self, now: Instant) {
        if self.is_expired(now) {
            self.count = 0;
            self.window_start = now;
        }
    }
}

static GLOBAL: Singleton<RateLimiter> = Singleton::new();

/// Per-identity fixed-window limiter.
pub struct RateLimiter {
    buckets: DashMap<String, RateBucket>,
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            limit: config.limit,
            window: config.window(),
            clock,
        }
    }

    /// The process-wide limiter.
    pub fn global(config: &ShieldConfig) -> Arc<RateLimiter> {
        GLOBAL.get_or_init(|| Self::new(&config.rate_limit))
    }

    pub fn reset_global_for_testing() {
        GLOBAL.reset();
    }

    /// Count one request for `identity` and report whether it is over the limit.
    ///
    /// With `force_block` the bucket is marked exhausted for the rest of its
    /// window and the call is reported as limited regardless of the count.
    pub fn is_rate_limited(&self, identity: &str, force_block: bool) -> bool {
        let identity = normalize(identity);
        let now = self.clock.now();

        let mut bucket = self
            .buckets
            .entry(identity.to_string())
            .or_insert_with(|| RateBucket::new(identity, now, self.limit, self.window));
        bucket.roll(now);

        if force_block {
            bucket.count = bucket.count.max(bucket.limit.saturating_add(1));
            drop(bucket);
            tracing::warn!(identity = %identity, "Identity force-blocked");
            metrics::record_rate_limited("forced");
            return true;
        }

        bucket.count = bucket.count.saturating_add(1);
        let limited = bucket.count > bucket.limit;
        let count = bucket.count;
        drop(bucket);

        if limited {
            tracing::warn!(identity = %identity, count, limit = self.limit, "Rate limit exceeded");
            metrics::record_rate_limited("window");
        }
        limited
    }

    /// Requests left in the current window without counting one.
    pub fn remaining(&self, identity: &str) -> u32 {
        let now = self.clock.now();
        match self.buckets.get(normalize(identity)) {
            Some(bucket) if !bucket.is_expired(now) => bucket.limit.saturating_sub(bucket.count),
            _ => self.limit,
        }
    }

    /// Drop buckets whose window has passed. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_expired(now));
        before - self.buckets.len()
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

fn normalize(identity: &str) -> &str {
    let trimmed = identity.trim();
    if trimmed.is_empty() {
        ANONYMOUS
    } else {
        trimmed
    }
}
