use crate::limiter::{RateLimiter, RateLimiterConfig};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Leaky bucket: each call adds one unit, the bucket drains at
/// `limit_count / limit_period`, a call is refused while the bucket is full.
pub struct LeakyBucketLimiter {
    state: Mutex<Bucket>,
}

struct Bucket {
    capacity: f64,
    /// Units drained per second
    rate: f64,
    level: f64,
    last_leak: Instant,
    config: Option<RateLimiterConfig>,
}

impl Bucket {
    fn leak(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_leak);
        self.level = (self.level - elapsed.as_secs_f64() * self.rate).max(0.0);
        self.last_leak = now;
    }
}

impl LeakyBucketLimiter {
    pub const KIND: &'static str = "leakyBucket";

    /// Unconfigured bucket; refuses everything until reloaded
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Bucket {
                capacity: 0.0,
                rate: 0.0,
                level: 0.0,
                last_leak: Instant::now(),
                config: None,
            }),
        }
    }

    /// Current water level
    pub fn level(&self) -> f64 {
        let mut state = self.state.lock();
        state.leak(Instant::now());
        state.level
    }
}

impl Default for LeakyBucketLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter for LeakyBucketLimiter {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn reload(&self, config: &RateLimiterConfig) {
        let mut state = self.state.lock();
        // drain at the old rate up to now before switching parameters
        state.leak(Instant::now());
        let period = config.limit_period.max(Duration::from_nanos(1));
        state.capacity = f64::from(config.limit_count);
        state.rate = f64::from(config.limit_count) / period.as_secs_f64();
        state.level = state.level.min(state.capacity);
        state.config = Some(config.clone());
    }

    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        state.leak(Instant::now());
        if state.level + 1.0 <= state.capacity {
            state.level += 1.0;
            true
        } else {
            false
        }
    }

    fn config(&self) -> Option<RateLimiterConfig> {
        self.state.lock().config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(limit: u32, period: Duration) -> RateLimiterConfig {
        RateLimiterConfig::new(LeakyBucketLimiter::KIND, limit, period)
    }

    #[test]
    fn test_unconfigured_refuses() {
        assert!(!LeakyBucketLimiter::new().try_acquire());
    }

    #[test]
    fn test_admits_up_to_capacity() {
        let limiter = LeakyBucketLimiter::new();
        limiter.reload(&config(3, Duration::from_secs(3600)));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_drains_over_time() {
        let limiter = LeakyBucketLimiter::new();
        limiter.reload(&config(1, Duration::from_millis(20)));
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_reload_keeps_level() {
        let limiter = LeakyBucketLimiter::new();
        limiter.reload(&config(10, Duration::from_secs(3600)));
        for _ in 0..4 {
            assert!(limiter.try_acquire());
        }
        limiter.reload(&config(20, Duration::from_secs(3600)));
        assert!(limiter.level() > 3.9);
        assert_eq!(limiter.config().map(|c| c.limit_count), Some(20));

        limiter.reload(&config(2, Duration::from_secs(3600)));
        assert!(limiter.level() <= 2.0);
        assert!(!limiter.try_acquire());
    }
}
