//! # Scheduler
//!
//! Producer side of the poller.
//!
//! Responsibilities:
//! - Split a `GatherJob` into bounded `SubRequest`s
//! - Re-arm each sub-request through a one-shot `Timer`
//! - Hand fired sub-requests to the bounded `ReadyQueue` without blocking
//! - Defer with jitter when the queue is full
//!
//! ## Usage Example
//!
//! ```ignore
//! use scheduler::{Producer, ReadyQueue, RandomJitter, Splitter, TokioTimer, Timer};
//!
//! let queue = ReadyQueue::new(128);
//! let producer = Producer::new(queue.clone(), shutdown.clone(), jitter, Duration::from_millis(50));
//! let timer = TokioTimer::new(Arc::new(producer), shutdown.child_token())?;
//!
//! for request in Splitter::new().split(&job)? {
//!     timer.arm(request.clone(), request.scan_rate());
//! }
//! while let Some(request) = queue.pop().await {
//!     // dispatch
//! }
//! ```

mod error;
mod jitter;
mod metrics;
mod producer;
mod ready_queue;
mod request;
mod splitter;
mod timer;

// Re-exports
pub use error::{EnqueueError, SchedulerError};
pub use jitter::{JitterSource, RandomJitter, SequenceJitter};
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use producer::Producer;
pub use ready_queue::ReadyQueue;
pub use request::SubRequest;
pub use splitter::{chunk_ranges, Splitter};
pub use timer::{FireTarget, Timer, TimerSlot, TokioTimer};
pub use tokio_util::sync::CancellationToken;
