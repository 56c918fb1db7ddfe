use crate::limiter::{LeakyBucketLimiter, RateLimiter, TokenBucketLimiter};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type LimiterFactory = Arc<dyn Fn() -> Arc<dyn RateLimiter> + Send + Sync>;

/// Rate limiting algorithms by name
#[derive(Clone)]
pub struct AlgorithmRegistry {
    factories: HashMap<String, LimiterFactory>,
}

impl AlgorithmRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// `leakyBucket` and `tokenBucket`
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(LeakyBucketLimiter::KIND, || {
            Arc::new(LeakyBucketLimiter::new()) as Arc<dyn RateLimiter>
        });
        registry.register(TokenBucketLimiter::KIND, || {
            Arc::new(TokenBucketLimiter::new()) as Arc<dyn RateLimiter>
        });
        registry
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn RateLimiter> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    /// Fresh, unconfigured limiter of `kind`
    pub fn create(&self, kind: &str) -> Option<Arc<dyn RateLimiter>> {
        self.factories.get(kind).map(|factory| factory())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
