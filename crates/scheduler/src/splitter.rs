//! Splits a gather job into sub-requests bounded by the function's quantity limit

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{ContractError, GatherJob};
use tracing::{debug, instrument};

use crate::SubRequest;

/// Contiguous `(address, quantity)` chunks of at most `max` items covering
/// `[address, address + quantity)`
pub fn chunk_ranges(address: u16, quantity: u16, max: u16) -> impl Iterator<Item = (u16, u16)> {
    let max = u32::from(max.max(1));
    let end = u32::from(address) + u32::from(quantity);
    let mut next = u32::from(address);

    std::iter::from_fn(move || {
        if next >= end {
            return None;
        }
        let count = (end - next).min(max);
        let chunk = (next as u16, count as u16);
        next += count;
        Some(chunk)
    })
}

/// Turns validated jobs into sub-requests with client-unique ids
#[derive(Debug, Default)]
pub struct Splitter {
    next_id: AtomicU64,
}

impl Splitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `job` and split it.
    ///
    /// # Errors
    /// Validation errors from [`GatherJob::validate`]; nothing is created on failure.
    #[instrument(
        name = "splitter_split",
        skip(self, job),
        fields(slave_id = job.slave_id, function_code = job.function_code, address = job.address, quantity = job.quantity)
    )]
    pub fn split(&self, job: &GatherJob) -> Result<Vec<Arc<SubRequest>>, ContractError> {
        let function = job.validate()?;

        let requests: Vec<_> = chunk_ranges(job.address, job.quantity, function.quantity_max())
            .map(|(address, quantity)| {
                Arc::new(SubRequest::new(
                    self.next_id.fetch_add(1, Ordering::Relaxed),
                    job.slave_id,
                    function,
                    address,
                    quantity,
                    job.scan_rate,
                    job.retry,
                ))
            })
            .collect();

        debug!(sub_requests = requests.len(), "job split");
        Ok(requests)
    }
}
