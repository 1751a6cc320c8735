//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the poller.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Cadences (scan rates) and jitter are `std::time::Duration`
//! - A scan rate of zero marks a one-shot job

mod blueprint;
mod error;
mod handler;
mod job;
mod protocol;
mod transport;

pub use blueprint::*;
pub use error::*;
pub use handler::{Fault, FaultHook, Handler, NopHandler};
pub use job::{GatherJob, PollResult};
pub use protocol::*;
pub use transport::{LocalTransport, Transport};
