//! Dispatch metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for one routing-slip engine
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Dispatches started
    dispatches: AtomicU64,
    /// Dispatches that walked their full itinerary
    succeeded: AtomicU64,
    /// Dispatches that ended in a terminal failure
    failed: AtomicU64,
    /// Steps sent successfully
    steps_sent: AtomicU64,
    /// Steps skipped under the invalid-endpoint policy
    steps_skipped: AtomicU64,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches started
    pub fn dispatches(&self) -> u64 {
        self.dispatches.load(Ordering::Relaxed)
    }

    /// Increment dispatch count
    pub fn inc_dispatches(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Successful dispatches
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Increment success count
    pub fn inc_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Failed dispatches
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Steps sent successfully
    pub fn steps_sent(&self) -> u64 {
        self.steps_sent.load(Ordering::Relaxed)
    }

    /// Increment sent-step count
    pub fn inc_steps_sent(&self) {
        self.steps_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Steps skipped
    pub fn steps_skipped(&self) -> u64 {
        self.steps_skipped.load(Ordering::Relaxed)
    }

    /// Increment skipped-step count
    pub fn inc_steps_skipped(&self) {
        self.steps_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatches: self.dispatches(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            steps_sent: self.steps_sent(),
            steps_skipped: self.steps_skipped(),
        }
    }
}

/// Point-in-time view of `DispatchMetrics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub dispatches: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub steps_sent: u64,
    pub steps_skipped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = DispatchMetrics::new();
        metrics.inc_dispatches();
        metrics.inc_steps_sent();
        metrics.inc_steps_sent();
        metrics.inc_steps_skipped();
        metrics.inc_succeeded();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.dispatches, 1);
        assert_eq!(snapshot.steps_sent, 2);
        assert_eq!(snapshot.steps_skipped, 1);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.failed, 0);
    }
}
