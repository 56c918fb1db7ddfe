//! Consumer-side references to remote services.

use crate::domain::url::ROUTE_OPTION;
use crate::domain::{CallResult, RequestEnvelope, RpcError, ServiceUrl};
use crate::filter::{FilterChainFactory, FilterTarget, Role};
use crate::invoker::Invoker;
use crate::ports::NodeInvoker;
use crate::route::{CandidatePool, Route, RouteRegistry, DEFAULT_ROUTE};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Terminal invoker of a consumer chain: snapshot the pool, let the route pick
pub struct ClusterInvoker {
    name: String,
    pool: Arc<CandidatePool>,
    route: Arc<dyn Route>,
}

impl ClusterInvoker {
    pub fn new(name: impl Into<String>, pool: Arc<CandidatePool>, route: Arc<dyn Route>) -> Self {
        Self {
            name: name.into(),
            pool,
            route,
        }
    }
}

#[async_trait]
impl Invoker for ClusterInvoker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: &mut RequestEnvelope) -> Result<CallResult, RpcError> {
        let candidate = self.pool.snapshot();
        debug!(refer = %self.name, nodes = candidate.len(), "Routing request");
        self.route.invoke(request, &candidate).await
    }

    async fn close(&self) -> Result<(), RpcError> {
        Ok(())
    }
}

/// A reference to a remote service
pub struct Refer {
    name: String,
    url: ServiceUrl,
    pool: Arc<CandidatePool>,
    chain: Arc<dyn Invoker>,
}

impl Refer {
    /// Build the consumer chain for `url`.
    ///
    /// The route strategy is taken from the `route` parameter; unknown names
    /// fall back to round robin.
    pub fn new(
        url: ServiceUrl,
        pool: Arc<CandidatePool>,
        function: Arc<dyn NodeInvoker>,
        routes: &RouteRegistry,
        chains: &FilterChainFactory,
    ) -> Self {
        let name = format!("{}/{}", url.path, url.get_or("alias", ""));
        let route_name = url.get_or(ROUTE_OPTION, DEFAULT_ROUTE);
        let route = match routes.create(route_name, &url, Arc::clone(&function)) {
            Some(route) => route,
            None => {
                warn!(refer = %name, route = route_name, "Unknown route, using default");
                routes.create_default(&url, function)
            }
        };

        let terminal: Arc<dyn Invoker> =
            Arc::new(ClusterInvoker::new(name.clone(), Arc::clone(&pool), route));
        let target = FilterTarget {
            name: name.clone(),
            interface: url.path.clone(),
            class: None,
            url: url.clone(),
        };
        let chain = chains.build(Role::Consumer, &target, terminal);

        info!(refer = %name, url = %url, "Service referred");
        Self {
            name,
            url,
            pool,
            chain,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &ServiceUrl {
        &self.url
    }

    pub fn pool(&self) -> &Arc<CandidatePool> {
        &self.pool
    }

    pub async fn invoke(&self, request: &mut RequestEnvelope) -> Result<CallResult, RpcError> {
        self.chain.invoke(request).await
    }

    pub async fn close(&self) -> Result<(), RpcError> {
        info!(refer = %self.name, "Closing refer");
        self.chain.close().await
    }
}
