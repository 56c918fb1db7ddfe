use crate::domain::{CallResult, RequestEnvelope, RpcError, ServiceUrl};
use crate::ports::NodeInvoker;
use crate::route::{Candidate, Route};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Rotates through the candidate nodes
pub struct RoundRobinRoute {
    next: AtomicUsize,
    function: Arc<dyn NodeInvoker>,
}

impl RoundRobinRoute {
    pub const NAME: &'static str = "roundRobin";

    pub fn new(_url: &ServiceUrl, function: Arc<dyn NodeInvoker>) -> Self {
        Self {
            next: AtomicUsize::new(0),
            function,
        }
    }
}

#[async_trait]
impl Route for RoundRobinRoute {
    async fn invoke(
        &self,
        request: &mut RequestEnvelope,
        candidate: &Candidate,
    ) -> Result<CallResult, RpcError> {
        let nodes = candidate.nodes();
        if nodes.is_empty() {
            return Err(RpcError::NoAliveProvider(format!(
                "no alive provider for {}",
                request.payload.class_name
            )));
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % nodes.len();
        self.function.invoke(&nodes[index], None, request).await
    }
}
