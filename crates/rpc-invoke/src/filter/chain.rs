//! Chain assembly.
//!
//! The chain is built back to front: the terminal invoker is wrapped by the
//! last selected filter, that node by the one before it, and so on. Each node
//! owns the next, so a chain cannot cycle.

use crate::domain::url::FILTER_OPTION;
use crate::domain::{CallResult, RequestEnvelope, RpcError, ServiceUrl};
use crate::filter::{
    BlackWhiteList, Filter, FilterConfigError, FilterFlags, FilterMeta, FilterRegistry,
    FilterTarget, Role,
};
use crate::invoker::Invoker;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Token excluding every SYSTEM filter at once
pub const DEFAULT_FILTERS: &str = "default";

/// One node of a chain: a filter plus everything after it
pub struct FilterInvoker {
    name: String,
    filter: Arc<dyn Filter>,
    next: Arc<dyn Invoker>,
}

impl FilterInvoker {
    pub fn new(name: impl Into<String>, filter: Arc<dyn Filter>, next: Arc<dyn Invoker>) -> Self {
        Self {
            name: name.into(),
            filter,
            next,
        }
    }
}

#[async_trait]
impl Invoker for FilterInvoker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: &mut RequestEnvelope) -> Result<CallResult, RpcError> {
        self.filter.invoke(self.next.as_ref(), request).await
    }

    /// Close this filter, then the rest of the chain. Both always run; the
    /// filter's own failure is reported first.
    async fn close(&self) -> Result<(), RpcError> {
        let own = self.filter.close().await;
        let rest = self.next.close().await;
        own.and(rest)
    }
}

/// Wrap `last` with `filters`, first filter outermost
pub fn assemble(
    name: &str,
    filters: Vec<Arc<dyn Filter>>,
    last: Arc<dyn Invoker>,
) -> Arc<dyn Invoker> {
    filters.into_iter().rev().fold(last, |next, filter| {
        Arc::new(FilterInvoker::new(name, filter, next)) as Arc<dyn Invoker>
    })
}

/// Whether `meta` belongs in a chain for `url` given the parsed list
pub fn includes(meta: &FilterMeta, url: &ServiceUrl, list: &BlackWhiteList) -> bool {
    if !(meta.applies)(url) {
        return false;
    }
    if meta.flags.contains(FilterFlags::INNER) {
        return true;
    }
    (list.is_white(&meta.name) || meta.flags.contains(FilterFlags::GLOBAL))
        && !list.is_black(&meta.name)
        && !(meta.flags.contains(FilterFlags::SYSTEM) && list.is_black(DEFAULT_FILTERS))
}

/// Builds provider and consumer chains from the role registries
#[derive(Debug, Clone)]
pub struct FilterChainFactory {
    provider: FilterRegistry,
    consumer: FilterRegistry,
}

impl FilterChainFactory {
    pub fn new(provider: FilterRegistry, consumer: FilterRegistry) -> Self {
        Self { provider, consumer }
    }

    /// No filters for either role
    pub fn empty() -> Self {
        Self::new(
            FilterRegistry::new(Role::Provider),
            FilterRegistry::new(Role::Consumer),
        )
    }

    pub fn registry(&self, role: Role) -> &FilterRegistry {
        match role {
            Role::Provider => &self.provider,
            Role::Consumer => &self.consumer,
        }
    }

    /// Filters selected for `url`, in priority order
    pub fn select(&self, role: Role, url: &ServiceUrl) -> Vec<&FilterMeta> {
        let list = BlackWhiteList::parse(url.get(FILTER_OPTION));
        self.registry(role)
            .metas()
            .iter()
            .filter(|meta| includes(meta, url, &list))
            .collect()
    }

    /// Build the chain for `target` ending in `last`
    pub fn build(&self, role: Role, target: &FilterTarget, last: Arc<dyn Invoker>) -> Arc<dyn Invoker> {
        let selected = self.select(role, &target.url);
        let filters: Vec<Arc<dyn Filter>> = selected
            .iter()
            .map(|meta| {
                let filter = (meta.factory)(target);
                filter.setup();
                filter
            })
            .collect();

        debug!(
            chain = %target.name,
            role = %role,
            filters = ?selected.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            "Filter chain built"
        );
        assemble(&target.name, filters, last)
    }

    /// Check that every included filter name in `option` is registered.
    /// Exclusions are not checked.
    pub fn validate(&self, role: Role, option: &str) -> Result<(), FilterConfigError> {
        let registry = self.registry(role);
        let list = BlackWhiteList::parse(Some(option));
        for name in list.names() {
            if list.is_white(name) && registry.get(name).is_none() {
                return Err(FilterConfigError::UnknownFilter {
                    role,
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Invocation, MessageHeader};
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    /// Records its name on the way in
    struct Tracing {
        name: String,
        trail: Arc<Mutex<Vec<String>>>,
        close_error: Option<RpcError>,
        closed: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Filter for Tracing {
        async fn invoke(
            &self,
            next: &dyn Invoker,
            request: &mut RequestEnvelope,
        ) -> Result<CallResult, RpcError> {
            self.trail.lock().push(self.name.clone());
            next.invoke(request).await
        }

        async fn close(&self) -> Result<(), RpcError> {
            self.closed.lock().push(self.name.clone());
            match &self.close_error {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    struct Terminal {
        close_error: Option<RpcError>,
        closed: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Invoker for Terminal {
        fn name(&self) -> &str {
            "terminal"
        }

        async fn invoke(&self, _request: &mut RequestEnvelope) -> Result<CallResult, RpcError> {
            Ok(CallResult::Value(json!(42)))
        }

        async fn close(&self) -> Result<(), RpcError> {
            self.closed.lock().push("terminal".into());
            match &self.close_error {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    struct Fixture {
        trail: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<Vec<String>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                trail: Arc::new(Mutex::new(Vec::new())),
                closed: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn meta(&self, name: &str, order: i32, flags: FilterFlags) -> FilterMeta {
            let trail = Arc::clone(&self.trail);
            let closed = Arc::clone(&self.closed);
            let filter_name = name.to_string();
            FilterMeta::new(name, order, flags, move |_| {
                Arc::new(Tracing {
                    name: filter_name.clone(),
                    trail: Arc::clone(&trail),
                    close_error: None,
                    closed: Arc::clone(&closed),
                }) as Arc<dyn Filter>
            })
        }

        fn terminal(&self, close_error: Option<RpcError>) -> Arc<dyn Invoker> {
            Arc::new(Terminal {
                close_error,
                closed: Arc::clone(&self.closed),
            })
        }
    }

    fn target(filter: Option<&str>) -> FilterTarget {
        let mut url = ServiceUrl::new("joy", "127.0.0.1", 22000).with_path("com.x.Foo");
        if let Some(filter) = filter {
            url = url.with_param(FILTER_OPTION, filter);
        }
        FilterTarget {
            name: "com.x.Foo/:22000".into(),
            interface: "com.x.Foo".into(),
            class: None,
            url,
        }
    }

    fn request() -> RequestEnvelope {
        RequestEnvelope::new(
            MessageHeader::request(1, Duration::ZERO),
            Invocation::new("com.x.Foo", "bar", ""),
        )
    }

    fn names(factory: &FilterChainFactory, target: &FilterTarget) -> Vec<String> {
        factory
            .select(Role::Provider, &target.url)
            .iter()
            .map(|m| m.name.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_filters_run_in_priority_order() {
        let fx = Fixture::new();
        let mut registry = FilterRegistry::new(Role::Provider);
        registry.register(fx.meta("g", 20, FilterFlags::GLOBAL));
        registry.register(fx.meta("w", 10, FilterFlags::NONE));
        let factory = FilterChainFactory::new(registry, FilterRegistry::new(Role::Consumer));

        let chain = factory.build(Role::Provider, &target(Some("w")), fx.terminal(None));
        assert_eq!(chain.name(), "com.x.Foo/:22000");

        let result = chain.invoke(&mut request()).await.unwrap();
        assert_eq!(result.resolve().await, Ok(json!(42)));
        assert_eq!(*fx.trail.lock(), vec!["w".to_string(), "g".to_string()]);
    }

    #[test]
    fn test_inclusion_rules() {
        let fx = Fixture::new();
        let mut registry = FilterRegistry::new(Role::Provider);
        registry.register(fx.meta("inner", 1, FilterFlags::INNER | FilterFlags::SYSTEM));
        registry.register(fx.meta("system", 2, FilterFlags::SYSTEM | FilterFlags::GLOBAL));
        registry.register(fx.meta("global", 3, FilterFlags::GLOBAL));
        registry.register(fx.meta("opt", 4, FilterFlags::NONE));
        registry.register(
            fx.meta("never", 5, FilterFlags::INNER)
                .with_applies(|_| false),
        );
        let factory = FilterChainFactory::new(registry, FilterRegistry::new(Role::Consumer));

        assert_eq!(names(&factory, &target(None)), vec!["inner", "system", "global"]);
        assert_eq!(
            names(&factory, &target(Some("opt;-global"))),
            vec!["inner", "system", "opt"]
        );
        assert_eq!(
            names(&factory, &target(Some("-default"))),
            vec!["inner", "global"]
        );
        assert_eq!(names(&factory, &target(Some("-inner, -system"))), vec!["inner", "global"]);
    }

    #[tokio::test]
    async fn test_empty_selection_returns_terminal() {
        let fx = Fixture::new();
        let factory = FilterChainFactory::empty();
        let chain = factory.build(Role::Provider, &target(None), fx.terminal(None));
        assert_eq!(chain.name(), "terminal");
    }

    #[tokio::test]
    async fn test_close_runs_every_node_and_reports_filter_first() {
        let fx = Fixture::new();
        let failing: Arc<dyn Filter> = Arc::new(Tracing {
            name: "a".into(),
            trail: Arc::clone(&fx.trail),
            close_error: Some(RpcError::TaskFailed("filter".into())),
            closed: Arc::clone(&fx.closed),
        });
        let chain = assemble(
            "svc",
            vec![failing],
            fx.terminal(Some(RpcError::TaskFailed("terminal".into()))),
        );

        let err = chain.close().await.unwrap_err();
        assert_eq!(err, RpcError::TaskFailed("filter".into()));
        assert_eq!(*fx.closed.lock(), vec!["a".to_string(), "terminal".to_string()]);
    }

    #[tokio::test]
    async fn test_close_reports_rest_of_chain_failure() {
        let fx = Fixture::new();
        let ok: Arc<dyn Filter> = Arc::new(Tracing {
            name: "a".into(),
            trail: Arc::clone(&fx.trail),
            close_error: None,
            closed: Arc::clone(&fx.closed),
        });
        let chain = assemble(
            "svc",
            vec![ok],
            fx.terminal(Some(RpcError::TaskFailed("terminal".into()))),
        );
        assert_eq!(
            chain.close().await,
            Err(RpcError::TaskFailed("terminal".into()))
        );
    }

    #[test]
    fn test_validate_checks_inclusions_only() {
        let fx = Fixture::new();
        let mut registry = FilterRegistry::new(Role::Provider);
        registry.register(fx.meta("known", 1, FilterFlags::NONE));
        let factory = FilterChainFactory::new(registry, FilterRegistry::new(Role::Consumer));

        assert!(factory.validate(Role::Provider, "known;-whatever").is_ok());
        assert_eq!(
            factory.validate(Role::Provider, "known,missing"),
            Err(FilterConfigError::UnknownFilter {
                role: Role::Provider,
                name: "missing".into()
            })
        );
        assert!(factory.validate(Role::Consumer, "known").is_err());
    }

    proptest! {
        #[test]
        fn prop_selection_is_sorted_and_deterministic(
            orders in proptest::collection::vec(-50i32..50, 1..12),
            excluded in proptest::collection::vec(any::<bool>(), 12),
        ) {
            let fx = Fixture::new();
            let mut registry = FilterRegistry::new(Role::Provider);
            for (i, order) in orders.iter().enumerate() {
                registry.register(fx.meta(&format!("f{}", i), *order, FilterFlags::GLOBAL));
            }
            let option: Vec<String> = (0..orders.len())
                .filter(|i| excluded[*i])
                .map(|i| format!("-f{}", i))
                .collect();
            let factory = FilterChainFactory::new(registry, FilterRegistry::new(Role::Consumer));
            let target = target(Some(&option.join(";")));

            let first = names(&factory, &target);
            let second = names(&factory, &target);
            prop_assert_eq!(&first, &second);

            let selected: Vec<i32> = factory
                .select(Role::Provider, &target.url)
                .iter()
                .map(|m| m.order)
                .collect();
            prop_assert!(selected.windows(2).all(|w| w[0] <= w[1]));

            let expected = (0..orders.len()).filter(|i| !excluded[*i]).count();
            prop_assert_eq!(first.len(), expected);
        }
    }
}
