//! Sliding-window request limiter keyed by client identity.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::config::RateLimitSettings;

/// Outcome of a single limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Configured requests per window.
    pub limit: u32,
    /// Requests still available in the current window after this one.
    pub remaining: u32,
    /// Seconds until the oldest counted request leaves the window. Zero when allowed.
    pub retry_after_secs: u64,
}

/// Counter store behind the rate-limit middleware.
pub trait RateLimitStore: Send + Sync {
    /// Count a request from `key` at `now` and decide whether it may proceed.
    fn check(&self, key: &str, now: Instant) -> RateDecision;

    /// Drop keys with no requests inside the window. Returns how many were removed.
    fn purge_expired(&self, now: Instant) -> usize;

    /// Window length.
    fn window(&self) -> Duration;
}

/// Process-local [`RateLimitStore`] backed by a concurrent map of request timestamps.
#[derive(Debug, Clone)]
pub struct InMemoryRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl InMemoryRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self { window, max_requests, buckets: Arc::new(DashMap::new()) }
    }

    pub fn from_settings(settings: RateLimitSettings) -> Self {
        Self::new(settings.window, settings.max_requests)
    }

    /// Number of tracked client keys.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

impl RateLimitStore for InMemoryRateLimiter {
    fn check(&self, key: &str, now: Instant) -> RateDecision {
        let window = self.window;
        let mut entry = self.buckets.entry(key.to_owned()).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let used = u32::try_from(entry.len()).unwrap_or(u32::MAX);
        if used >= self.max_requests {
            let retry_after = entry
                .first()
                .map_or(window, |oldest| window.saturating_sub(now.duration_since(*oldest)));
            return RateDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                retry_after_secs: retry_after.as_secs().max(1),
            };
        }

        entry.push(now);
        RateDecision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests - used - 1,
            retry_after_secs: 0,
        }
    }

    fn purge_expired(&self, now: Instant) -> usize {
        let window = self.window;
        let before = self.buckets.len();
        self.buckets.retain(|_, hits| {
            hits.last().is_some_and(|last| now.duration_since(*last) < window)
        });
        before.saturating_sub(self.buckets.len())
    }

    fn window(&self) -> Duration {
        self.window
    }
}

/// Spawn a task that purges idle keys once per window.
pub fn spawn_purger(store: Arc<dyn RateLimitStore>) -> JoinHandle<()> {
    let every = store.window();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        loop {
            ticker.tick().await;
            let removed = store.purge_expired(Instant::now());
            if removed > 0 {
                tracing::debug!(removed, "purged idle rate-limit keys");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = InMemoryRateLimiter::new(WINDOW, 3);
        let t0 = Instant::now();

        let remaining: Vec<u32> = (0..3).map(|_| limiter.check("1.2.3.4", t0).remaining).collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let denied = limiter.check("1.2.3.4", t0);
        assert!(!denied.allowed);
        assert_eq!(denied.limit, 3);
        assert_eq!(denied.retry_after_secs, 60);
    }

    #[test]
    fn window_rollover_restores_budget() {
        let limiter = InMemoryRateLimiter::new(WINDOW, 2);
        let t0 = Instant::now();
        assert!(limiter.check("k", t0).allowed);
        assert!(limiter.check("k", t0 + Duration::from_secs(30)).allowed);
        assert!(!limiter.check("k", t0 + Duration::from_secs(45)).allowed);

        let after_first_expires = limiter.check("k", t0 + WINDOW);
        assert!(after_first_expires.allowed, "oldest hit left the window");
        assert_eq!(after_first_expires.remaining, 0);
    }

    #[test]
    fn retry_after_counts_down_from_oldest_hit() {
        let limiter = InMemoryRateLimiter::new(WINDOW, 1);
        let t0 = Instant::now();
        assert!(limiter.check("k", t0).allowed);

        let denied = limiter.check("k", t0 + Duration::from_secs(50));
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs, 10);
    }

    #[test]
    fn rejected_requests_do_not_extend_the_window() {
        let limiter = InMemoryRateLimiter::new(WINDOW, 1);
        let t0 = Instant::now();
        assert!(limiter.check("k", t0).allowed);
        for s in 1..30 {
            assert!(!limiter.check("k", t0 + Duration::from_secs(s)).allowed);
        }
        assert!(limiter.check("k", t0 + WINDOW).allowed);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = InMemoryRateLimiter::new(WINDOW, 1);
        let t0 = Instant::now();
        assert!(limiter.check("a", t0).allowed);
        assert!(!limiter.check("a", t0).allowed);
        assert!(limiter.check("b", t0).allowed);
    }

    #[test]
    fn zero_cap_rejects_everything() {
        let limiter = InMemoryRateLimiter::new(WINDOW, 0);
        assert!(!limiter.check("k", Instant::now()).allowed);
    }

    #[test]
    fn purge_drops_only_idle_keys() {
        let limiter = InMemoryRateLimiter::new(WINDOW, 10);
        let t0 = Instant::now();
        limiter.check("idle", t0);
        limiter.check("active", t0 + Duration::from_secs(40));

        let removed = limiter.purge_expired(t0 + Duration::from_secs(70));

        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn concurrent_checks_never_exceed_the_cap() {
        let limiter = Arc::new(InMemoryRateLimiter::new(WINDOW, 50));
        let now = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..20).filter(|_| limiter.check("k", now).allowed).count())
            })
            .collect();

        let allowed: usize = handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(n) => n,
                Err(_) => panic!("worker thread panicked"),
            })
            .sum();
        assert_eq!(allowed, 50);
    }
}
