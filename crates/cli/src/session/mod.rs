//! Polling session support: result aggregation and end-of-run statistics.

mod handler;
mod stats;

pub use handler::StatsHandler;
pub use stats::RunStats;
