//! # Dispatcher
//!
//! The single sequential consumer of the ready queue.
//!
//! Responsibilities:
//! - Own the transport exclusively, so at most one read is ever in flight
//! - Isolate each dispatch behind a fault boundary
//! - Decide the next arm of every sub-request (fast retry, cadence or dormant)
//! - Report payloads and per-attempt results to the `Handler`

pub mod dispatcher;
pub mod error;
pub mod fault;
pub mod handle;
pub mod metrics;
pub mod reschedule;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::DispatcherError;
pub use fault::panic_message;
pub use handle::DispatcherHandle;
pub use metrics::{DispatchMetrics, DispatchMetricsSnapshot};
pub use reschedule::Reschedule;
