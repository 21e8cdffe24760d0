//! Per-client sliding window rate limiting.
//!
//! Each client id maps to the timestamps of its admitted requests inside the
//! trailing window. A request is admitted while fewer than `limit` timestamps
//! remain after expired ones are dropped.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Admitted; `remaining` more requests fit in the current window.
    Allowed { remaining: u32 },
    /// Rejected; the caller should wait `retry_after`.
    Limited { retry_after: Duration },
}

/// Sliding window limiter keyed by client id.
///
/// The map is sharded, so clients on different shards never contend. The
/// check-then-append for one client runs under that client's shard lock.
pub struct RateLimiter {
    entries: DashMap<String, VecDeque<Instant>>,
    limit: u32,
    window: Duration,
    max_entries: usize,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
            window,
            max_entries,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.limit,
            Duration::from_secs(config.window_secs),
            config.max_entries,
        )
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    /// Check and record a request from `client` at `now`.
    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let decision = {
            let mut timestamps = self.entries.entry(client.to_owned()).or_default();
            while timestamps
                .front()
                .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
            {
                timestamps.pop_front();
            }

            let used = timestamps.len() as u32;
            if used >= self.limit {
                RateDecision::Limited {
                    retry_after: self.window,
                }
            } else {
                timestamps.push_back(now);
                RateDecision::Allowed {
                    remaining: self.limit - used - 1,
                }
            }
        };

        // The entry guard must be released before touching the whole map.
        if self.entries.len() > self.max_entries {
            self.evict_stale(now);
        }

        decision
    }

    /// Remove clients with no timestamp inside the window ending at `now`.
    /// Returns the number of clients removed.
    pub fn evict_stale(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|newest| now.saturating_duration_since(*newest) < self.window)
        });
        let evicted = before.saturating_sub(self.entries.len());

        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.entries.len(), "Evicted stale rate-limit entries");
            metrics::record_rate_limit_evictions(evicted);
        }
        metrics::record_rate_limit_clients(self.entries.len());
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::new(limit, Duration::from_secs(60), 10_000)
    }

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = limiter(3);
        let now = Instant::now();

        assert_eq!(limiter.check_at("a", now), RateDecision::Allowed { remaining: 2 });
        assert_eq!(limiter.check_at("a", now), RateDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at("a", now), RateDecision::Allowed { remaining: 0 });
        assert_eq!(
            limiter.check_at("a", now),
            RateDecision::Limited {
                retry_after: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn rejected_requests_are_not_recorded() {
        let limiter = limiter(1);
        let start = Instant::now();

        assert!(matches!(limiter.check_at("a", start), RateDecision::Allowed { .. }));
        for i in 1..10 {
            let at = start + Duration::from_secs(i);
            assert!(matches!(limiter.check_at("a", at), RateDecision::Limited { .. }));
        }
        // Only the first request counts, so the client frees up 60s after it.
        assert!(matches!(
            limiter.check_at("a", start + Duration::from_secs(60)),
            RateDecision::Allowed { .. }
        ));
    }

    #[test]
    fn window_slides_rather_than_resets() {
        let limiter = limiter(2);
        let start = Instant::now();

        limiter.check_at("a", start);
        limiter.check_at("a", start + Duration::from_secs(30));
        assert!(matches!(
            limiter.check_at("a", start + Duration::from_secs(59)),
            RateDecision::Limited { .. }
        ));
        // The first timestamp has left the window, the second has not.
        assert_eq!(
            limiter.check_at("a", start + Duration::from_secs(60)),
            RateDecision::Allowed { remaining: 0 }
        );
        assert!(matches!(
            limiter.check_at("a", start + Duration::from_secs(61)),
            RateDecision::Limited { .. }
        ));
    }

    #[test]
    fn clients_are_independent() {
        let limiter = limiter(1);
        let now = Instant::now();
        assert!(matches!(limiter.check_at("a", now), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check_at("b", now), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check_at("a", now), RateDecision::Limited { .. }));
    }

    #[test]
    fn eviction_runs_only_above_cap() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60), 2);
        let start = Instant::now();
        limiter.check_at("a", start);
        limiter.check_at("b", start);
        assert_eq!(limiter.tracked_clients(), 2);

        // Third client exceeds the cap after a and b went stale.
        let later = start + Duration::from_secs(120);
        limiter.check_at("c", later);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn eviction_keeps_active_clients() {
        let limiter = limiter(5);
        let start = Instant::now();
        limiter.check_at("stale", start);
        limiter.check_at("active", start + Duration::from_secs(50));

        let evicted = limiter.evict_stale(start + Duration::from_secs(70));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
