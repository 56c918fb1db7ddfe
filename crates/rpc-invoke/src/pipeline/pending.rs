//! In-flight provider calls awaiting completion.
//!
//! Each admitted call registers a oneshot sender keyed by
//! (channel id, message id). If the call outlives its deadline the sweeper
//! fires a timeout through the sender; the completion task is racing the
//! invocation against the receiving end, so whichever finishes first decides
//! the response.

use crate::domain::{codes, CallbackConfig, RequestEnvelope, RpcError};
use crate::ports::{CancelSignal, Channel, InvocationCallback};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Deadline used when the caller's timeout is too large to represent
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

struct PendingCall {
    cancel: Option<oneshot::Sender<RpcError>>,
    registered_at: Instant,
    deadline: Instant,
    method: String,
}

/// Pending call counters
#[derive(Debug, Default)]
pub struct PendingStats {
    pub total_registered: AtomicU64,
    pub total_completed: AtomicU64,
    pub total_timeouts: AtomicU64,
    pub total_cancelled: AtomicU64,
}

/// Built-in [`InvocationCallback`]
pub struct PendingCalls {
    pending: DashMap<(u64, u64), PendingCall>,
    default_timeout: Duration,
    stats: Arc<PendingStats>,
}

impl PendingCalls {
    /// `default_timeout` applies to requests without a header timeout
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            default_timeout,
            stats: Arc::new(PendingStats::default()),
        }
    }

    pub fn from_config(config: &CallbackConfig) -> Self {
        Self::new(config.default_timeout)
    }

    /// Fire a timeout for every call past its deadline.
    ///
    /// Returns the number of calls expired.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|(channel_id, msg_id), call| {
            if now < call.deadline {
                return true;
            }
            let elapsed = now.duration_since(call.registered_at);
            warn!(
                channel_id,
                msg_id,
                method = %call.method,
                elapsed_ms = elapsed.as_millis() as u64,
                "Removing expired pending call"
            );
            if let Some(cancel) = call.cancel.take() {
                let _ = cancel.send(RpcError::Timeout(format!(
                    "[{}]Timeout while processing {} after {}ms",
                    codes::COMMON_CALL_TIMEOUT,
                    call.method,
                    elapsed.as_millis()
                )));
            }
            self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
            removed += 1;
            false
        });

        removed
    }

    /// Abandon a call with `reason`, e.g. when its connection closes.
    ///
    /// Returns false if the call already completed.
    pub fn cancel(&self, channel_id: u64, msg_id: u64, reason: RpcError) -> bool {
        match self.pending.remove(&(channel_id, msg_id)) {
            Some((_, mut call)) => {
                if let Some(cancel) = call.cancel.take() {
                    let _ = cancel.send(reason);
                }
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, channel_id: u64, msg_id: u64) -> bool {
        self.pending.contains_key(&(channel_id, msg_id))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

impl InvocationCallback for PendingCalls {
    fn register(&self, channel: &dyn Channel, request: &RequestEnvelope) -> CancelSignal {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        let timeout = request.remaining().unwrap_or(self.default_timeout);
        let method = format!(
            "{}/{}",
            request.payload.class_name, request.payload.method_name
        );
        let key = (channel.id(), request.header.msg_id);
        let deadline = now
            .checked_add(timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);

        debug!(
            channel_id = key.0,
            msg_id = key.1,
            method = %method,
            timeout_ms = timeout.as_millis() as u64,
            "Registered pending call"
        );
        self.pending.insert(
            key,
            PendingCall {
                cancel: Some(tx),
                registered_at: now,
                deadline,
                method,
            },
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        rx
    }

    fn remove(&self, channel_id: u64, msg_id: u64) {
        if self.pending.remove(&(channel_id, msg_id)).is_some() {
            self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Background task expiring overdue calls
pub async fn sweep_task(calls: Arc<PendingCalls>, interval: Duration) {
    let mut sweep_interval = tokio::time::interval(interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        let removed = calls.remove_expired();
        if removed > 0 {
            debug!(removed, "Expired pending calls");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryChannel;
    use crate::domain::{Invocation, MessageHeader};
    use std::net::SocketAddr;

    fn channel() -> MemoryChannel {
        let addr: SocketAddr = "127.0.0.1:22000".parse().unwrap();
        MemoryChannel::create(8, addr, addr).0
    }

    fn request(msg_id: u64, timeout: Duration) -> RequestEnvelope {
        RequestEnvelope::new(
            MessageHeader::request(msg_id, timeout),
            Invocation::new("com.x.Foo", "bar", ""),
        )
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let calls = PendingCalls::new(Duration::from_secs(30));
        let channel = channel();
        let mut signal = calls.register(&channel, &request(1, Duration::ZERO));
        assert!(calls.is_pending(channel.id(), 1));

        calls.remove(channel.id(), 1);
        assert_eq!(calls.pending_count(), 0);
        assert_eq!(calls.stats().total_completed.load(Ordering::Relaxed), 1);
        // sender dropped without firing
        assert!(signal.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_expired_fires_timeout() {
        let calls = PendingCalls::new(Duration::from_secs(30));
        let channel = channel();
        let signal = calls.register(&channel, &request(1, Duration::from_millis(5)));
        let _other = calls.register(&channel, &request(2, Duration::ZERO));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.remove_expired(), 1);
        assert!(matches!(signal.await, Ok(RpcError::Timeout(_))));
        assert!(calls.is_pending(channel.id(), 2));
        assert_eq!(calls.stats().total_timeouts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_unbounded_client_timeout_registers() {
        let calls = PendingCalls::new(Duration::from_secs(30));
        let channel = channel();
        let _signal = calls.register(&channel, &request(3, Duration::MAX));

        assert_eq!(calls.remove_expired(), 0);
        assert!(calls.is_pending(channel.id(), 3));
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let calls = PendingCalls::new(Duration::from_secs(30));
        let channel = channel();
        let signal = calls.register(&channel, &request(9, Duration::ZERO));

        assert!(calls.cancel(channel.id(), 9, RpcError::Shutdown("closed".into())));
        assert_eq!(signal.await, Ok(RpcError::Shutdown("closed".into())));
        assert!(!calls.cancel(channel.id(), 9, RpcError::Shutdown("closed".into())));
    }
}
