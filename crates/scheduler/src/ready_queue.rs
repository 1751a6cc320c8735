//! Bounded FIFO hand-off between timers and the dispatcher

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::trace;

use crate::error::EnqueueError;
use crate::metrics::QueueMetrics;
use crate::SubRequest;

/// Ready queue.
///
/// Many producers push with [`ReadyQueue::try_push`], which never blocks; a
/// single consumer pops in insertion order. A sub-request is in the queue at
/// most once at any instant.
#[derive(Clone)]
pub struct ReadyQueue {
    tx: Sender<Arc<SubRequest>>,
    rx: Receiver<Arc<SubRequest>>,
    metrics: Arc<QueueMetrics>,
}

impl ReadyQueue {
    /// Create a queue holding at most `capacity` sub-requests (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            metrics: Arc::new(QueueMetrics::new()),
        }
    }

    /// Non-blocking hand-off
    pub fn try_push(&self, request: Arc<SubRequest>) -> Result<(), EnqueueError> {
        if !request.mark_queued() {
            return Err(EnqueueError::AlreadyQueued(request));
        }

        match self.tx.try_send(request) {
            Ok(()) => {
                self.metrics.record_enqueued(self.tx.len());
                Ok(())
            }
            Err(TrySendError::Full(request)) => {
                request.clear_queued();
                trace!(request_id = request.id(), "ready queue full");
                Err(EnqueueError::Full(request))
            }
            Err(TrySendError::Closed(request)) => {
                request.clear_queued();
                Err(EnqueueError::Closed(request))
            }
        }
    }

    /// Wait for the next sub-request. Returns `None` once the queue is closed
    /// and drained. Cancel-safe.
    pub async fn pop(&self) -> Option<Arc<SubRequest>> {
        let request = self.rx.recv().await.ok()?;
        Some(self.on_dequeued(request))
    }

    /// Take the next sub-request if one is ready
    pub fn try_pop(&self) -> Option<Arc<SubRequest>> {
        let request = self.rx.try_recv().ok()?;
        Some(self.on_dequeued(request))
    }

    fn on_dequeued(&self, request: Arc<SubRequest>) -> Arc<SubRequest> {
        request.clear_queued();
        self.metrics.record_dequeued(self.rx.len());
        request
    }

    /// Reject every further push and wake a waiting consumer
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<QueueMetrics> {
        self.metrics.clone()
    }
}
