//! Per-source adaptive rate limiting.
//!
//! Each source gets its own limiter seeded with a base request interval.
//! A 429 doubles the interval (capped); successful calls decay it back
//! toward the base. The governor limiter itself is immutable, so interval
//! changes swap in a fresh limiter via [`arc_swap`].

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

fn limiter_for_interval(interval_ms: u64) -> DirectLimiter {
    let quota = Quota::with_period(Duration::from_millis(interval_ms.max(1)))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN));
    RateLimiter::direct(quota)
}

/// Limiter for one source, with multiplicative backoff on 429s.
pub struct AdaptiveSourceLimiter {
    limiter: ArcSwap<DirectLimiter>,
    interval_ms: AtomicU64,
    base_ms: u64,
    max_ms: u64,
}

impl AdaptiveSourceLimiter {
    pub fn new(base_interval: Duration) -> Self {
        let base_ms = base_interval.as_millis().max(1) as u64;
        Self {
            limiter: ArcSwap::from_pointee(limiter_for_interval(base_ms)),
            interval_ms: AtomicU64::new(base_ms),
            base_ms,
            max_ms: base_ms * 16,
        }
    }

    /// Wait until the next request slot is available.
    pub async fn acquire(&self) {
        let limiter = self.limiter.load_full();
        limiter.until_ready().await;
    }

    /// Called after a 429: double the interval, up to the cap.
    pub fn on_rate_limited(&self) {
        let cur = self.interval_ms.load(Ordering::Relaxed);
        let next = (cur.saturating_mul(2)).min(self.max_ms);
        if next != cur {
            self.interval_ms.store(next, Ordering::Relaxed);
            self.limiter.store(Arc::new(limiter_for_interval(next)));
            tracing::warn!(interval_ms = next, "rate limited, backing off");
        }
    }

    /// Called after a successful request: step the interval back toward base.
    pub fn on_success(&self) {
        let cur = self.interval_ms.load(Ordering::Relaxed);
        if cur <= self.base_ms {
            return;
        }
        let next = (cur * 3 / 4).max(self.base_ms);
        self.interval_ms.store(next, Ordering::Relaxed);
        self.limiter.store(Arc::new(limiter_for_interval(next)));
    }

    pub fn current_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }
}

/// The per-source limiters shared across the whole pipeline.
pub struct RateLimiters {
    limiters: HashMap<&'static str, AdaptiveSourceLimiter>,
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl RateLimiters {
    /// Base intervals depend on credentials: Semantic Scholar's free tier
    /// is far slower without an API key, and CrossRef's polite pool
    /// (mailto set) allows a faster cadence.
    pub fn new(has_s2_key: bool, has_crossref_mailto: bool) -> Self {
        let s2_ms = if has_s2_key { 1_000 } else { 3_000 };
        let crossref_ms = if has_crossref_mailto { 500 } else { 1_000 };
        let mut limiters = HashMap::new();
        limiters.insert("dblp", AdaptiveSourceLimiter::new(Duration::from_millis(500)));
        limiters.insert(
            "semantic_scholar",
            AdaptiveSourceLimiter::new(Duration::from_millis(s2_ms)),
        );
        limiters.insert(
            "crossref",
            AdaptiveSourceLimiter::new(Duration::from_millis(crossref_ms)),
        );
        limiters.insert(
            "neurips",
            AdaptiveSourceLimiter::new(Duration::from_millis(1_000)),
        );
        Self { limiters }
    }

    /// Unknown sources (mocks, future adapters) pass through unlimited.
    pub async fn acquire(&self, source: &str) {
        if let Some(limiter) = self.limiters.get(source) {
            limiter.acquire().await;
        }
    }

    pub fn on_rate_limited(&self, source: &str) {
        if let Some(limiter) = self.limiters.get(source) {
            limiter.on_rate_limited();
        }
    }

    pub fn on_success(&self, source: &str) {
        if let Some(limiter) = self.limiters.get(source) {
            limiter.on_success();
        }
    }

    pub fn current_interval(&self, source: &str) -> Option<Duration> {
        self.limiters.get(source).map(|l| l.current_interval())
    }
}
