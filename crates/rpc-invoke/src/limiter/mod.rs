//! Hot-reloadable rate limiters.
//!
//! Each service owns a [`LimiterSet`] keyed by `method:alias:appId`. A change
//! of the service's limit setting is parsed into [`RateLimiterConfig`]s and
//! reconciled against the live set: instances are reused when only their
//! parameters change, so accumulated bucket state survives a reload.

pub mod algorithm;
pub mod config;
pub mod handler;
pub mod leaky_bucket;
pub mod registry;
pub mod token_bucket;

pub use algorithm::AlgorithmRegistry;
pub use config::{limiter_key, parse_limiter_configs, LimiterParseError, RateLimiterConfig};
pub use handler::LimiterConfigHandler;
pub use leaky_bucket::LeakyBucketLimiter;
pub use registry::{LimiterRegistry, LimiterSet};
pub use token_bucket::TokenBucketLimiter;

/// Algorithm used when a limiter entry does not name one
pub const DEFAULT_LIMITER_TYPE: &str = LeakyBucketLimiter::KIND;

/// A stateful rate limiter
pub trait RateLimiter: Send + Sync {
    /// Algorithm name, as registered in the [`AlgorithmRegistry`]
    fn kind(&self) -> &str;

    /// Apply new parameters in place
    fn reload(&self, config: &RateLimiterConfig);

    /// Take one permit if available. Never blocks.
    fn try_acquire(&self) -> bool;

    /// Parameters currently in effect
    fn config(&self) -> Option<RateLimiterConfig>;
}
