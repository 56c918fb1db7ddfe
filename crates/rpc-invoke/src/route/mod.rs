//! Node selection strategies.
//!
//! A [`Route`] picks a node from a [`Candidate`] snapshot and hands the
//! request to the shared [`NodeInvoker`]. Strategies are looked up by name in
//! the [`RouteRegistry`].

pub mod candidate;
pub mod pinpoint;
pub mod round_robin;

pub use candidate::{Candidate, CandidatePool, Node, NodeState};
pub use pinpoint::PinPointRoute;
pub use round_robin::RoundRobinRoute;

use crate::domain::{CallResult, RequestEnvelope, RpcError, ServiceUrl};
use crate::ports::NodeInvoker;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Strategy used when a refer names none
pub const DEFAULT_ROUTE: &str = RoundRobinRoute::NAME;

#[async_trait]
pub trait Route: Send + Sync {
    async fn invoke(
        &self,
        request: &mut RequestEnvelope,
        candidate: &Candidate,
    ) -> Result<CallResult, RpcError>;
}

type RouteFactory = fn(&ServiceUrl, Arc<dyn NodeInvoker>) -> Arc<dyn Route>;

/// Route strategies by name
#[derive(Clone)]
pub struct RouteRegistry {
    factories: HashMap<&'static str, RouteFactory>,
}

impl RouteRegistry {
    /// `pinpoint` and `roundRobin`
    pub fn with_defaults() -> Self {
        let mut factories: HashMap<&'static str, RouteFactory> = HashMap::new();
        factories.insert(PinPointRoute::NAME, |url, function| {
            Arc::new(PinPointRoute::new(url, function)) as Arc<dyn Route>
        });
        factories.insert(RoundRobinRoute::NAME, |url, function| {
            Arc::new(RoundRobinRoute::new(url, function)) as Arc<dyn Route>
        });
        Self { factories }
    }

    pub fn create(
        &self,
        name: &str,
        url: &ServiceUrl,
        function: Arc<dyn NodeInvoker>,
    ) -> Option<Arc<dyn Route>> {
        self.factories.get(name).map(|factory| factory(url, function))
    }

    /// Strategy named by [`DEFAULT_ROUTE`]; round robin if it is not registered
    pub fn create_default(&self, url: &ServiceUrl, function: Arc<dyn NodeInvoker>) -> Arc<dyn Route> {
        match self.create(DEFAULT_ROUTE, url, Arc::clone(&function)) {
            Some(route) => route,
            None => Arc::new(RoundRobinRoute::new(url, function)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().copied()
    }
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
