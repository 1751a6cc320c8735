//! Producer - moves fired sub-requests into the ready queue

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::EnqueueError;
use crate::jitter::JitterSource;
use crate::timer::{FireTarget, Timer};
use crate::{ReadyQueue, SubRequest};

/// Fire target shared by every sub-request of a client.
///
/// Never blocks: a full queue defers the hand-off by a jittered delay
/// instead of waiting for space.
pub struct Producer {
    queue: ReadyQueue,
    shutdown: CancellationToken,
    jitter: Arc<dyn JitterSource>,
    jitter_max: Duration,
}

impl Producer {
    pub fn new(
        queue: ReadyQueue,
        shutdown: CancellationToken,
        jitter: Arc<dyn JitterSource>,
        jitter_max: Duration,
    ) -> Self {
        Self {
            queue,
            shutdown,
            jitter,
            jitter_max,
        }
    }
}

impl FireTarget for Producer {
    fn on_fire(&self, timer: &dyn Timer, request: Arc<SubRequest>) {
        if self.shutdown.is_cancelled() {
            return;
        }

        match self.queue.try_push(request) {
            Ok(()) => {
                trace!("sub-request ready");
            }
            Err(EnqueueError::Full(request)) => {
                if self.shutdown.is_cancelled() {
                    return;
                }
                let delay = self.jitter.sample(self.jitter_max);
                self.queue.metrics().record_deferred();
                observability::record_queue_full();
                trace!(
                    request_id = request.id(),
                    delay_ms = delay.as_millis() as u64,
                    "ready queue full, deferring"
                );
                timer.arm(request, delay);
            }
            Err(EnqueueError::Closed(request)) => {
                debug!(request_id = request.id(), "ready queue closed, dropping fire");
            }
            Err(EnqueueError::AlreadyQueued(request)) => {
                warn!(request_id = request.id(), "timer fired for a queued sub-request");
            }
        }
    }
}
