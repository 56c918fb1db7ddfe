//! Per-service limiter sets.
//!
//! The service → set map is stored behind [`ArcSwap`]: filters load a
//! snapshot without locking while configuration changes publish a whole new
//! map. A reader sees either the old set or the new one, never a mix.

use crate::limiter::{limiter_key, AlgorithmRegistry, RateLimiter, RateLimiterConfig};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// The live limiters of one service, keyed by `method:alias:appId`
#[derive(Clone, Default)]
pub struct LimiterSet {
    limiters: HashMap<String, Arc<dyn RateLimiter>>,
}

impl LimiterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn RateLimiter>> {
        self.limiters.get(key)
    }

    /// Most specific limiter for the call. Lookup order:
    /// `m:a:app`, `m:a:`, `m::app`, `m::`, `:a:app`, `:a:`, `::app`, `::`.
    pub fn lookup(&self, method: &str, alias: &str, app_id: &str) -> Option<&Arc<dyn RateLimiter>> {
        for m in [method, ""] {
            for a in [alias, ""] {
                for app in [app_id, ""] {
                    if let Some(limiter) = self.limiters.get(&limiter_key(m, a, app)) {
                        return Some(limiter);
                    }
                    if app_id.is_empty() {
                        break;
                    }
                }
                if alias.is_empty() {
                    break;
                }
            }
            if method.is_empty() {
                break;
            }
        }
        None
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.limiters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

impl FromIterator<(String, Arc<dyn RateLimiter>)> for LimiterSet {
    fn from_iter<T: IntoIterator<Item = (String, Arc<dyn RateLimiter>)>>(iter: T) -> Self {
        Self {
            limiters: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for LimiterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.limiters.keys()).finish()
    }
}

/// Service name → live limiter set
pub struct LimiterRegistry {
    sets: ArcSwap<HashMap<String, Arc<LimiterSet>>>,
    algorithms: AlgorithmRegistry,
}

impl LimiterRegistry {
    pub fn new() -> Self {
        Self::with_algorithms(AlgorithmRegistry::with_defaults())
    }

    pub fn with_algorithms(algorithms: AlgorithmRegistry) -> Self {
        Self {
            sets: ArcSwap::from_pointee(HashMap::new()),
            algorithms,
        }
    }

    /// Current set of `service`
    pub fn get(&self, service: &str) -> Option<Arc<LimiterSet>> {
        self.sets.load().get(service).cloned()
    }

    /// Ask the matching limiter for a permit. `None` when no limiter applies.
    pub fn acquire(&self, service: &str, method: &str, alias: &str, app_id: &str) -> Option<bool> {
        let sets = self.sets.load();
        let limiter = sets.get(service)?.lookup(method, alias, app_id)?;
        Some(limiter.try_acquire())
    }

    /// Replace the service's set wholesale; `None` removes it
    pub fn update(&self, service: &str, set: Option<LimiterSet>) {
        let set = set.map(Arc::new);
        self.sets.rcu(|current| {
            let mut next = HashMap::clone(current);
            match &set {
                Some(set) => {
                    next.insert(service.to_string(), Arc::clone(set));
                }
                None => {
                    next.remove(service);
                }
            }
            next
        });
        match &set {
            Some(set) => info!(service, limiters = set.len(), "Limiters updated"),
            None => info!(service, "Limiters cleared"),
        }
    }

    /// Build the set for `configs`, reusing limiters from `existing`.
    ///
    /// A key whose limiter has the same algorithm keeps its instance and is
    /// reloaded in place. New keys and algorithm changes get a fresh
    /// instance; an unknown algorithm drops the key.
    pub fn reconcile(
        &self,
        configs: HashMap<String, RateLimiterConfig>,
        existing: Option<&LimiterSet>,
    ) -> LimiterSet {
        configs
            .into_iter()
            .filter_map(|(key, config)| {
                let reusable = existing
                    .and_then(|set| set.get(&key))
                    .filter(|limiter| limiter.kind() == config.kind);

                let limiter = match reusable {
                    Some(limiter) => {
                        debug!(key = %key, kind = %config.kind, "Reloading limiter");
                        Arc::clone(limiter)
                    }
                    None => match self.algorithms.create(&config.kind) {
                        Some(limiter) => limiter,
                        None => {
                            error!(key = %key, kind = %config.kind, "Rate limiter algorithm is not found");
                            return None;
                        }
                    },
                };
                limiter.reload(&config);
                Some((key, limiter))
            })
            .collect()
    }
}

impl Default for LimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LimiterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimiterRegistry")
            .field("services", &self.sets.load().keys().collect::<Vec<_>>())
            .field("algorithms", &self.algorithms)
            .finish()
    }
}
