//! Ready queue metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Ready queue metrics
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Sub-requests accepted by the queue
    enqueued: AtomicU64,

    /// Hand-offs deferred because the queue was full
    deferred: AtomicU64,

    /// Sub-requests taken by the consumer
    dequeued: AtomicU64,

    /// Current queue length
    queue_len: AtomicUsize,
}

impl QueueMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record accepted hand-off
    pub fn record_enqueued(&self, queue_len: usize) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.update_queue_len(queue_len);
    }

    /// Record hand-off deferred on a full queue
    pub fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    /// Record sub-request taken by the consumer
    pub fn record_dequeued(&self, queue_len: usize) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        self.update_queue_len(queue_len);
    }

    /// Update queue length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        observability::record_queue_depth(len);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Ready queue metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueMetricsSnapshot {
    pub enqueued: u64,
    pub deferred: u64,
    pub dequeued: u64,
    pub queue_len: usize,
}
