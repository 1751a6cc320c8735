//! Scheduler error types

use std::sync::Arc;

use contracts::ContractError;
use thiserror::Error;

use crate::SubRequest;

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Timer created outside a Tokio runtime
    #[error("no tokio runtime available for the timer: {message}")]
    NoRuntime { message: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Rejected ready queue hand-off; the sub-request is handed back
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// Queue at capacity
    #[error("ready queue full")]
    Full(Arc<SubRequest>),

    /// Queue closed (client shutting down)
    #[error("ready queue closed")]
    Closed(Arc<SubRequest>),

    /// The sub-request is already waiting in the queue
    #[error("sub-request already queued")]
    AlreadyQueued(Arc<SubRequest>),
}

impl EnqueueError {
    /// Take back the rejected sub-request
    pub fn into_inner(self) -> Arc<SubRequest> {
        match self {
            Self::Full(request) | Self::Closed(request) | Self::AlreadyQueued(request) => request,
        }
    }
}
