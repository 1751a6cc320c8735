//! One-shot timer capability and its Tokio implementation

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::SchedulerError;
use crate::SubRequest;

/// Re-armable one-shot timer keyed by sub-request.
pub trait Timer: Send + Sync {
    /// Fire once for `request` after `delay`. Arming again before the fire
    /// replaces the pending one.
    fn arm(&self, request: Arc<SubRequest>, delay: Duration);

    /// Drop every pending fire. No callback runs once this returns, and
    /// later arms are ignored.
    fn cancel_all(&self);
}

/// Receiver of timer fires
pub trait FireTarget: Send + Sync {
    /// Called when `request`'s timer elapses. `timer` is the timer that fired,
    /// for re-arming.
    fn on_fire(&self, timer: &dyn Timer, request: Arc<SubRequest>);
}

/// Per-request timer state: the epoch of the latest arm
#[derive(Debug, Default)]
pub struct TimerSlot {
    epoch: AtomicU64,
}

impl TimerSlot {
    /// Invalidate pending fires and return the epoch of the new arm
    pub fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Whether `epoch` is still the latest arm
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::Acquire) == epoch
    }
}

/// Timer backed by one `tokio::time::sleep` task per arm
#[derive(Clone)]
pub struct TokioTimer {
    inner: Arc<TimerInner>,
}

struct TimerInner {
    target: Arc<dyn FireTarget>,
    runtime: Handle,
    shutdown: CancellationToken,
    /// Held shared while a callback runs; `cancel_all` takes it exclusively
    gate: RwLock<()>,
    pending: AtomicUsize,
}

impl TokioTimer {
    /// Create a timer on the current Tokio runtime.
    ///
    /// Cancelling `shutdown` has the same effect as [`Timer::cancel_all`].
    ///
    /// # Errors
    /// `NoRuntime` when called outside a Tokio runtime.
    pub fn new(
        target: Arc<dyn FireTarget>,
        shutdown: CancellationToken,
    ) -> Result<Self, SchedulerError> {
        let runtime = Handle::try_current().map_err(|e| SchedulerError::NoRuntime {
            message: e.to_string(),
        })?;
        Ok(Self::with_handle(target, shutdown, runtime))
    }

    /// Create a timer spawning on `runtime`
    pub fn with_handle(
        target: Arc<dyn FireTarget>,
        shutdown: CancellationToken,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                target,
                runtime,
                shutdown,
                gate: RwLock::new(()),
                pending: AtomicUsize::new(0),
            }),
        }
    }

    /// Arms not yet fired or cancelled
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    fn fire(&self, request: Arc<SubRequest>, epoch: u64) {
        let _running = self.inner.gate.read().unwrap_or_else(PoisonError::into_inner);
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        if !request.timer_slot().is_current(epoch) {
            trace!(request_id = request.id(), "superseded timer fire skipped");
            return;
        }
        self.inner.target.on_fire(self, request);
    }
}

impl Timer for TokioTimer {
    fn arm(&self, request: Arc<SubRequest>, delay: Duration) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }

        let epoch = request.timer_slot().next_epoch();
        let timer = self.clone();
        self.inner.pending.fetch_add(1, Ordering::AcqRel);

        self.inner.runtime.spawn(async move {
            let elapsed = tokio::select! {
                biased;
                _ = timer.inner.shutdown.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            };
            timer.inner.pending.fetch_sub(1, Ordering::AcqRel);
            if elapsed {
                timer.fire(request, epoch);
            }
        });
    }

    fn cancel_all(&self) {
        self.inner.shutdown.cancel();
        // Wait out a callback that passed the cancellation check before us
        drop(self.inner.gate.write().unwrap_or_else(PoisonError::into_inner));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FunctionCode;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTarget {
        fired: Mutex<Vec<(u64, tokio::time::Instant)>>,
    }

    impl RecordingTarget {
        fn fired(&self) -> Vec<(u64, tokio::time::Instant)> {
            self.fired.lock().unwrap().clone()
        }
    }

    impl FireTarget for RecordingTarget {
        fn on_fire(&self, _timer: &dyn Timer, request: Arc<SubRequest>) {
            self.fired
                .lock()
                .unwrap()
                .push((request.id(), tokio::time::Instant::now()));
        }
    }

    fn request(id: u64) -> Arc<SubRequest> {
        Arc::new(SubRequest::new(
            id,
            1,
            FunctionCode::ReadHoldingRegisters,
            0,
            1,
            Duration::from_millis(100),
            0,
        ))
    }

    fn timer() -> (TokioTimer, Arc<RecordingTarget>) {
        let target = Arc::new(RecordingTarget::default());
        let timer = TokioTimer::new(target.clone(), CancellationToken::new()).unwrap();
        (timer, target)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let (timer, target) = timer();
        let start = tokio::time::Instant::now();
        timer.arm(request(1), Duration::from_millis(100));
        assert_eq!(timer.pending(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(target.fired().is_empty());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let fired = target.fired();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, 1);
        assert_eq!(fired[0].1 - start, Duration::from_millis(100));
        assert_eq!(timer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending_fire() {
        let (timer, target) = timer();
        let req = request(2);
        timer.arm(req.clone(), Duration::from_millis(100));
        timer.arm(req, Duration::from_millis(300));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(target.fired().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(target.fired().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_fires() {
        let (timer, target) = timer();
        timer.arm(request(1), Duration::from_millis(100));
        timer.arm(request(2), Duration::from_millis(200));
        timer.cancel_all();
        timer.arm(request(3), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(target.fired().is_empty());
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let target = Arc::new(RecordingTarget::default());
        let result = TokioTimer::new(target, CancellationToken::new());
        assert!(matches!(result, Err(SchedulerError::NoRuntime { .. })));
    }
}
