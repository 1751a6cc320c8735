//! Dispatch metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

use crate::Reschedule;

/// Counters updated by the dispatcher task
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    /// Panics caught by the fault boundary, handler panics included
    faults: AtomicU64,
    fast_retries: AtomicU64,
    cadence_rearms: AtomicU64,
    dormant: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_outcome(&self, success: bool) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reschedule(&self, decision: Reschedule) {
        let counter = match decision {
            Reschedule::FastRetry => &self.fast_retries,
            Reschedule::Cadence(_) => &self.cadence_rearms,
            Reschedule::Dormant => &self.dormant,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> DispatchMetricsSnapshot {
        DispatchMetricsSnapshot {
            dispatched: self.dispatched(),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            faults: self.faults(),
            fast_retries: self.fast_retries.load(Ordering::Relaxed),
            cadence_rearms: self.cadence_rearms.load(Ordering::Relaxed),
            dormant: self.dormant.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchMetricsSnapshot {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub faults: u64,
    pub fast_retries: u64,
    pub cadence_rearms: u64,
    pub dormant: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_snapshot_counts() {
        let metrics = DispatchMetrics::new();
        metrics.record_outcome(true);
        metrics.record_outcome(false);
        metrics.record_fault();
        metrics.record_reschedule(Reschedule::FastRetry);
        metrics.record_reschedule(Reschedule::Cadence(Duration::from_secs(1)));
        metrics.record_reschedule(Reschedule::Dormant);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.dispatched, 2);
        assert_eq!((snapshot.succeeded, snapshot.failed), (1, 1));
        assert_eq!(snapshot.faults, 1);
        assert_eq!(
            (snapshot.fast_retries, snapshot.cadence_rearms, snapshot.dormant),
            (1, 1, 1)
        );
    }
}
