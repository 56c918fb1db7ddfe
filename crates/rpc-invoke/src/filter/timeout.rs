use crate::domain::{codes, CallResult, RequestEnvelope, RpcError};
use crate::filter::{Filter, FilterTarget};
use crate::invoker::Invoker;
use async_trait::async_trait;
use tracing::warn;

/// Bounds the remote call by the request's header timeout
pub struct ConsumerTimeoutFilter {
    chain: String,
}

impl ConsumerTimeoutFilter {
    pub const NAME: &'static str = "timeout";
    pub const ORDER: i32 = -100;

    pub fn new(target: &FilterTarget) -> Self {
        Self {
            chain: target.name.clone(),
        }
    }
}

#[async_trait]
impl Filter for ConsumerTimeoutFilter {
    async fn invoke(
        &self,
        next: &dyn Invoker,
        request: &mut RequestEnvelope,
    ) -> Result<CallResult, RpcError> {
        let Some(remaining) = request.remaining() else {
            return next.invoke(request).await;
        };
        let msg_id = request.header.msg_id;
        let timeout = request.header.timeout;

        match tokio::time::timeout(remaining, next.invoke(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(chain = %self.chain, msg_id, timeout_ms = timeout.as_millis() as u64, "Remote call timed out");
                Err(RpcError::Timeout(format!(
                    "[{}]Timeout calling {} after {}ms, msg id {}",
                    codes::CONSUMER_TIMEOUT,
                    self.chain,
                    timeout.as_millis(),
                    msg_id
                )))
            }
        }
    }
}
