//! Static filter registry, one per role.

use crate::domain::url::CONCURRENCY_OPTION;
use crate::domain::ServiceUrl;
use crate::filter::{
    ConcurrencyFilter, ConsumerTimeoutFilter, Filter, FilterFlags, FilterTarget,
    ProviderLimiterFilter, Role,
};
use crate::limiter::LimiterRegistry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

/// Applicability test against the exporter/refer URL
pub type AppliesFn = Arc<dyn Fn(&ServiceUrl) -> bool + Send + Sync>;

/// Builds a filter instance for one chain
pub type FilterFactory = Arc<dyn Fn(&FilterTarget) -> Arc<dyn Filter> + Send + Sync>;

/// Registration record of a filter
#[derive(Clone)]
pub struct FilterMeta {
    pub name: String,
    /// Lower runs first
    pub order: i32,
    pub flags: FilterFlags,
    pub applies: AppliesFn,
    pub factory: FilterFactory,
}

impl FilterMeta {
    pub fn new<F>(name: impl Into<String>, order: i32, flags: FilterFlags, factory: F) -> Self
    where
        F: Fn(&FilterTarget) -> Arc<dyn Filter> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            order,
            flags,
            applies: Arc::new(|_| true),
            factory: Arc::new(factory),
        }
    }

    /// Builder: restrict the filter to URLs passing `applies`
    pub fn with_applies<F>(mut self, applies: F) -> Self
    where
        F: Fn(&ServiceUrl) -> bool + Send + Sync + 'static,
    {
        self.applies = Arc::new(applies);
        self
    }
}

impl fmt::Debug for FilterMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterMeta")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Filters available to one role, kept sorted by order
#[derive(Debug, Clone)]
pub struct FilterRegistry {
    role: Role,
    metas: Vec<FilterMeta>,
}

impl FilterRegistry {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            metas: Vec::new(),
        }
    }

    /// Built-in provider filters: `concurrency` and `limiter`
    pub fn provider_defaults(limiters: Arc<LimiterRegistry>) -> Self {
        let counters: Arc<DashMap<String, Arc<AtomicU32>>> = Arc::new(DashMap::new());

        let mut registry = Self::new(Role::Provider);
        registry.register(
            FilterMeta::new(
                ConcurrencyFilter::NAME,
                ConcurrencyFilter::ORDER,
                FilterFlags::SYSTEM,
                move |target| {
                    Arc::new(ConcurrencyFilter::new(target, Arc::clone(&counters))) as Arc<dyn Filter>
                },
            )
            .with_applies(|url| url.get_u32(CONCURRENCY_OPTION, 0) > 0),
        );
        registry.register(FilterMeta::new(
            ProviderLimiterFilter::NAME,
            ProviderLimiterFilter::ORDER,
            FilterFlags::SYSTEM | FilterFlags::GLOBAL,
            move |target| {
                Arc::new(ProviderLimiterFilter::new(target, Arc::clone(&limiters))) as Arc<dyn Filter>
            },
        ));
        registry
    }

    /// Built-in consumer filters: `timeout`
    pub fn consumer_defaults() -> Self {
        let mut registry = Self::new(Role::Consumer);
        registry.register(FilterMeta::new(
            ConsumerTimeoutFilter::NAME,
            ConsumerTimeoutFilter::ORDER,
            FilterFlags::SYSTEM | FilterFlags::GLOBAL,
            |target| Arc::new(ConsumerTimeoutFilter::new(target)) as Arc<dyn Filter>,
        ));
        registry
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Add a filter after every registered filter of the same or lower order.
    /// A filter registered under an existing name replaces it.
    pub fn register(&mut self, meta: FilterMeta) {
        self.metas.retain(|m| m.name != meta.name);
        let position = self
            .metas
            .iter()
            .position(|m| m.order > meta.order)
            .unwrap_or(self.metas.len());
        self.metas.insert(position, meta);
    }

    pub fn get(&self, name: &str) -> Option<&FilterMeta> {
        self.metas.iter().find(|m| m.name == name)
    }

    /// Filters in priority order
    pub fn metas(&self) -> &[FilterMeta] {
        &self.metas
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}
