use crate::domain::{CallResult, RequestEnvelope, RpcError, HIDDEN_KEY_APP_ID};
use crate::filter::{Filter, FilterTarget};
use crate::invoker::Invoker;
use crate::limiter::LimiterRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Rejects calls refused by the service's rate limiters
pub struct ProviderLimiterFilter {
    interface: String,
    limiters: Arc<LimiterRegistry>,
}

impl ProviderLimiterFilter {
    pub const NAME: &'static str = "limiter";
    pub const ORDER: i32 = -90;

    pub fn new(target: &FilterTarget, limiters: Arc<LimiterRegistry>) -> Self {
        Self {
            interface: target.interface.clone(),
            limiters,
        }
    }
}

#[async_trait]
impl Filter for ProviderLimiterFilter {
    async fn invoke(
        &self,
        next: &dyn Invoker,
        request: &mut RequestEnvelope,
    ) -> Result<CallResult, RpcError> {
        let invocation = &request.payload;
        let app_id = request.context.attachment(HIDDEN_KEY_APP_ID).unwrap_or("");
        let permitted = self.limiters.acquire(
            &self.interface,
            &invocation.method_name,
            &invocation.alias,
            app_id,
        );
        if permitted == Some(false) {
            debug!(
                interface = %self.interface,
                method = %invocation.method_name,
                alias = %invocation.alias,
                app_id,
                "Request rate limited"
            );
            return Err(RpcError::RateLimited(format!(
                "request of {}/{}/{} from app '{}' is rate limited",
                self.interface, invocation.method_name, invocation.alias, app_id
            )));
        }
        next.invoke(request).await
    }
}
