//! Fixed-window rate limiting, one bucket per key (typically an IP) per
//! configured endpoint family (spec 4.7).

use dashmap::DashMap;

use crate::config::components::RateLimitRule;

struct Bucket {
    count: u32,
    expires_at: i64,
}

pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: Option<u32>,
    pub retry_after: Option<u64>,
}

/// One fixed-window limiter. Disabled (always allows) when `max <= 0` or
/// `window_ms <= 0`.
pub struct RateLimiter {
    max: u32,
    window_ms: u64,
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(rule: RateLimitRule) -> Self {
        Self {
            max: rule.max,
            window_ms: rule.window_ms,
            buckets: DashMap::new(),
        }
    }

    fn disabled(&self) -> bool {
        self.max == 0 || self.window_ms == 0
    }

    pub fn consume(&self, key: &str) -> RateLimitDecision {
        if self.disabled() {
            return RateLimitDecision {
                allowed: true,
                remaining: None,
                retry_after: None,
            };
        }

        let now = now_ms();
        let mut entry = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            count: 0,
            expires_at: now + self.window_ms as i64,
        });

        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + self.window_ms as i64;
        }

        if entry.count < self.max {
            entry.count += 1;
            let remaining = self.max - entry.count;
            drop(entry);
            self.maybe_prune();
            RateLimitDecision {
                allowed: true,
                remaining: Some(remaining),
                retry_after: None,
            }
        } else {
            let retry_after = ((entry.expires_at - now).max(1000) / 1000).max(1) as u64;
            RateLimitDecision {
                allowed: false,
                remaining: Some(0),
                retry_after: Some(retry_after),
            }
        }
    }

    fn maybe_prune(&self) {
        if self.buckets.len() <= 5000 {
            return;
        }
        let now = now_ms();
        self.buckets.retain(|_, bucket| bucket.expires_at > now);
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_then_refuses() {
        let limiter = RateLimiter::new(RateLimitRule { max: 2, window_ms: 60_000 });
        assert!(limiter.consume("1.2.3.4").allowed);
        assert!(limiter.consume("1.2.3.4").allowed);
        let refused = limiter.consume("1.2.3.4");
        assert!(!refused.allowed);
        assert!(refused.retry_after.unwrap() >= 1);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(RateLimitRule { max: 1, window_ms: 60_000 });
        assert!(limiter.consume("a").allowed);
        assert!(limiter.consume("b").allowed);
        assert!(!limiter.consume("a").allowed);
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = RateLimiter::new(RateLimitRule { max: 0, window_ms: 60_000 });
        for _ in 0..100 {
            assert!(limiter.consume("x").allowed);
        }
    }
}
