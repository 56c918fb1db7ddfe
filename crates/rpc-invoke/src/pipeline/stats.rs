use std::sync::atomic::{AtomicU64, Ordering};

/// Provider pipeline counters
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    discarded_timeout: AtomicU64,
    discarded_backpressure: AtomicU64,
    rejected: AtomicU64,
    responses_sent: AtomicU64,
    duplicates_suppressed: AtomicU64,
    send_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub discarded_timeout: u64,
    pub discarded_backpressure: u64,
    pub rejected: u64,
    pub responses_sent: u64,
    pub duplicates_suppressed: u64,
    pub send_failures: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded_timeout(&self) {
        self.discarded_timeout.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded_backpressure(&self) {
        self.discarded_backpressure.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            discarded_timeout: self.discarded_timeout.load(Ordering::Relaxed),
            discarded_backpressure: self.discarded_backpressure.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}
