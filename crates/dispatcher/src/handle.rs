//! DispatcherHandle - owns the running dispatcher task

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use crate::error::DispatcherError;
use crate::metrics::DispatchMetrics;

/// Handle to a spawned dispatcher. Shutting it down hands the transport back.
pub struct DispatcherHandle<T> {
    task: JoinHandle<T>,
    shutdown: CancellationToken,
    metrics: Arc<DispatchMetrics>,
}

impl<T> DispatcherHandle<T> {
    pub(crate) fn new(
        task: JoinHandle<T>,
        shutdown: CancellationToken,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            task,
            shutdown,
            metrics,
        }
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the in-flight dispatch to finish.
    ///
    /// # Errors
    /// `TaskFailed` when the task panicked outside the fault boundary or was
    /// aborted; the transport is lost in that case.
    #[instrument(name = "dispatcher_handle_shutdown", skip(self))]
    pub async fn shutdown(self) -> Result<T, DispatcherError> {
        self.shutdown.cancel();
        match self.task.await {
            Ok(transport) => {
                debug!("Dispatcher joined");
                Ok(transport)
            }
            Err(e) => {
                error!(error = %e, "Dispatcher task failed");
                Err(DispatcherError::task_failed(e.to_string()))
            }
        }
    }
}
