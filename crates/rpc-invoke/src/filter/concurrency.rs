use crate::domain::url::CONCURRENCY_OPTION;
use crate::domain::{CallResult, RequestEnvelope, RpcError};
use crate::filter::{Filter, FilterTarget};
use crate::invoker::Invoker;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Caps in-flight calls per exporter.
///
/// Counters are keyed by chain name so a rebuilt chain keeps counting the
/// calls still running through the old one.
pub struct ConcurrencyFilter {
    chain: String,
    max: u32,
    active: Arc<AtomicU32>,
}

impl ConcurrencyFilter {
    pub const NAME: &'static str = "concurrency";
    pub const ORDER: i32 = -100;

    pub fn new(target: &FilterTarget, counters: Arc<DashMap<String, Arc<AtomicU32>>>) -> Self {
        let active = counters
            .entry(target.name.clone())
            .or_insert_with(|| Arc::new(AtomicU32::new(0)))
            .clone();
        Self {
            chain: target.name.clone(),
            max: target.url.get_u32(CONCURRENCY_OPTION, 0),
            active,
        }
    }

    pub fn active(&self) -> u32 {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the slot even if the call future is dropped
struct Permit<'a>(&'a AtomicU32);

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[async_trait]
impl Filter for ConcurrencyFilter {
    async fn invoke(
        &self,
        next: &dyn Invoker,
        request: &mut RequestEnvelope,
    ) -> Result<CallResult, RpcError> {
        let acquired = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max).then_some(n + 1)
            })
            .is_ok();
        if !acquired {
            warn!(chain = %self.chain, max = self.max, "Too many concurrent requests");
            return Err(RpcError::Overloaded(format!(
                "too many concurrent requests on {}, max {}",
                self.chain, self.max
            )));
        }
        let _permit = Permit(&self.active);
        next.invoke(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Invocation, MessageHeader, ServiceUrl};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Gate(Arc<Notify>);

    #[async_trait]
    impl Invoker for Gate {
        fn name(&self) -> &str {
            "gate"
        }

        async fn invoke(&self, _request: &mut RequestEnvelope) -> Result<CallResult, RpcError> {
            self.0.notified().await;
            Ok(CallResult::Value(json!(true)))
        }

        async fn close(&self) -> Result<(), RpcError> {
            Ok(())
        }
    }

    fn target(max: &str) -> FilterTarget {
        FilterTarget {
            name: "com.x.Foo/:22000".into(),
            interface: "com.x.Foo".into(),
            class: None,
            url: ServiceUrl::new("joy", "127.0.0.1", 22000).with_param(CONCURRENCY_OPTION, max),
        }
    }

    fn request() -> RequestEnvelope {
        RequestEnvelope::new(
            MessageHeader::request(1, Duration::ZERO),
            Invocation::new("com.x.Foo", "bar", ""),
        )
    }

    #[tokio::test]
    async fn test_rejects_over_limit_and_releases() {
        let counters = Arc::new(DashMap::new());
        let filter = Arc::new(ConcurrencyFilter::new(&target("1"), Arc::clone(&counters)));
        let gate = Arc::new(Notify::new());
        let next = Arc::new(Gate(Arc::clone(&gate)));

        let running = {
            let filter = Arc::clone(&filter);
            let next = Arc::clone(&next);
            tokio::spawn(async move { filter.invoke(next.as_ref(), &mut request()).await })
        };
        while filter.active() == 0 {
            tokio::task::yield_now().await;
        }

        let rejected = filter.invoke(next.as_ref(), &mut request()).await;
        assert!(matches!(rejected, Err(RpcError::Overloaded(_))));

        gate.notify_one();
        assert!(running.await.unwrap().is_ok());
        assert_eq!(filter.active(), 0);
    }

    #[test]
    fn test_rebuilt_chain_shares_counter() {
        let counters = Arc::new(DashMap::new());
        let first = ConcurrencyFilter::new(&target("2"), Arc::clone(&counters));
        let second = ConcurrencyFilter::new(&target("2"), Arc::clone(&counters));
        assert!(Arc::ptr_eq(&first.active, &second.active));
    }
}
