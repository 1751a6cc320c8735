//! # Poller
//!
//! Client facade tying the scheduler and the dispatcher together.
//!
//! ## Usage Example
//!
//! ```ignore
//! use poller::{Client, ClientOptions, LogHandler};
//!
//! let options = ClientOptions::default().with_handler(Arc::new(LogHandler::new("plant")));
//! let mut client = Client::new(transport, options)?;
//! client.start().await?;
//! client.add_gather_job(job)?;
//! // ...
//! client.close().await?;
//! ```

mod client;
mod handlers;
mod options;

pub use client::{Client, ClientStats};
pub use contracts::{Fault, FaultHook, GatherJob, Handler, NopHandler, PollResult};
pub use handlers::LogHandler;
pub use options::ClientOptions;
