use crate::limiter::{RateLimiter, RateLimiterConfig};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as Governor,
};
use parking_lot::RwLock;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::warn;

type DirectLimiter = Governor<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket backed by a `governor` direct limiter.
///
/// `limit_count` permits replenish evenly over `limit_period`, with a burst of
/// `limit_count`. Reloading swaps the inner limiter and carries the permits
/// already spent over to it; the outer instance stays.
pub struct TokenBucketLimiter {
    inner: RwLock<Option<Inner>>,
}

struct Inner {
    limiter: DirectLimiter,
    config: RateLimiterConfig,
}

impl TokenBucketLimiter {
    pub const KIND: &'static str = "tokenBucket";

    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    fn quota(config: &RateLimiterConfig) -> Option<Quota> {
        let burst = NonZeroU32::new(config.limit_count)?;
        let replenish = config.limit_period / config.limit_count;
        let replenish = replenish.max(Duration::from_nanos(1));
        Quota::with_period(replenish).map(|quota| quota.allow_burst(burst))
    }

    /// Take every permit still available and return how many there were.
    ///
    /// Tries each power of two once, largest first; after a try of `step`
    /// fewer than `step` permits remain.
    fn drain(limiter: &DirectLimiter, burst: u32) -> u32 {
        let mut taken = 0;
        let mut step = match burst.checked_ilog2() {
            Some(exp) => 1u32 << exp,
            None => return 0,
        };
        while let Some(n) = NonZeroU32::new(step) {
            if matches!(limiter.check_n(n), Ok(Ok(()))) {
                taken += step;
            }
            step >>= 1;
        }
        taken
    }
}

impl Default for TokenBucketLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn reload(&self, config: &RateLimiterConfig) {
        let mut inner = self.inner.write();
        if inner.as_ref().map(|i| &i.config) == Some(config) {
            return;
        }
        match Self::quota(config) {
            Some(quota) => {
                let limiter = Governor::direct(quota);
                if let Some(old) = inner.as_ref() {
                    let burst = old.config.limit_count;
                    let used = burst - Self::drain(&old.limiter, burst).min(burst);
                    if let Some(n) = NonZeroU32::new(used.min(config.limit_count)) {
                        let _ = limiter.check_n(n);
                    }
                }
                *inner = Some(Inner {
                    limiter,
                    config: config.clone(),
                });
            }
            None => {
                warn!(?config, "Invalid token bucket quota, keeping previous parameters");
            }
        }
    }

    fn try_acquire(&self) -> bool {
        match self.inner.read().as_ref() {
            Some(inner) => inner.limiter.check().is_ok(),
            None => false,
        }
    }

    fn config(&self) -> Option<RateLimiterConfig> {
        self.inner.read().as_ref().map(|i| i.config.clone())
    }
}
