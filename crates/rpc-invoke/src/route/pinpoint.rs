use crate::domain::{CallResult, RequestEnvelope, RpcError, ServiceUrl, HIDDEN_KEY_PINPOINT};
use crate::ports::NodeInvoker;
use crate::route::{Candidate, Route};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Routes to the exact node named by the `.pinpoint` attachment.
///
/// No fallback: if that node is not among the candidates the call fails.
pub struct PinPointRoute {
    protocol: String,
    function: Arc<dyn NodeInvoker>,
}

impl PinPointRoute {
    pub const NAME: &'static str = "pinpoint";

    pub fn new(url: &ServiceUrl, function: Arc<dyn NodeInvoker>) -> Self {
        Self {
            protocol: url.protocol.clone(),
            function,
        }
    }
}

#[async_trait]
impl Route for PinPointRoute {
    async fn invoke(
        &self,
        request: &mut RequestEnvelope,
        candidate: &Candidate,
    ) -> Result<CallResult, RpcError> {
        let pinpoint = match request.context.attachment(HIDDEN_KEY_PINPOINT) {
            Some(pinpoint) if !pinpoint.is_empty() => pinpoint.to_string(),
            _ => {
                return Err(RpcError::IllegalValue(format!(
                    "{} is not configured in request context.",
                    HIDDEN_KEY_PINPOINT
                )))
            }
        };
        let target = ServiceUrl::parse(&pinpoint, &self.protocol).map_err(|e| {
            RpcError::IllegalValue(format!("invalid {} '{}': {}", HIDDEN_KEY_PINPOINT, pinpoint, e))
        })?;

        let node = candidate
            .nodes()
            .iter()
            .find(|node| node.url.host == target.host && node.url.port == target.port)
            .ok_or_else(|| {
                RpcError::NoAliveProvider(format!("not found node {} in candidate", pinpoint))
            })?;

        debug!(node = %node.url.address(), "Pin-point node selected");
        self.function.invoke(node, None, request).await
    }
}
