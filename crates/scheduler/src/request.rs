//! SubRequest - one bounded chunk of a gather job

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use contracts::{FunctionCode, PollResult};

use crate::timer::TimerSlot;

/// One independently scheduled read.
///
/// Shared as `Arc<SubRequest>` between its timer and the dispatcher. The
/// counters are only written by the dispatcher; the timer never fires while
/// the request is queued or being dispatched.
#[derive(Debug)]
pub struct SubRequest {
    id: u64,
    slave_id: u8,
    function: FunctionCode,
    address: u16,
    quantity: u16,
    scan_rate: Duration,
    retry: u8,

    retry_count: AtomicU8,
    tx_count: AtomicU64,
    err_count: AtomicU64,
    queued: AtomicBool,
    timer: TimerSlot,
}

impl SubRequest {
    /// Create a sub-request with zeroed counters
    pub fn new(
        id: u64,
        slave_id: u8,
        function: FunctionCode,
        address: u16,
        quantity: u16,
        scan_rate: Duration,
        retry: u8,
    ) -> Self {
        Self {
            id,
            slave_id,
            function,
            address,
            quantity,
            scan_rate,
            retry,
            retry_count: AtomicU8::new(0),
            tx_count: AtomicU64::new(0),
            err_count: AtomicU64::new(0),
            queued: AtomicBool::new(false),
            timer: TimerSlot::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn slave_id(&self) -> u8 {
        self.slave_id
    }

    pub fn function(&self) -> FunctionCode {
        self.function
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn quantity(&self) -> u16 {
        self.quantity
    }

    pub fn scan_rate(&self) -> Duration {
        self.scan_rate
    }

    /// Fast retry budget
    pub fn retry(&self) -> u8 {
        self.retry
    }

    /// Whether the request runs once
    pub fn is_one_shot(&self) -> bool {
        self.scan_rate.is_zero()
    }

    pub fn retry_count(&self) -> u8 {
        self.retry_count.load(Ordering::Acquire)
    }

    pub fn tx_count(&self) -> u64 {
        self.tx_count.load(Ordering::Acquire)
    }

    pub fn err_count(&self) -> u64 {
        self.err_count.load(Ordering::Acquire)
    }

    /// Count a transmission, returning the new total
    pub fn record_attempt(&self) -> u64 {
        self.tx_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Count a failed attempt, returning the new total
    pub fn record_error(&self) -> u64 {
        self.err_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Advance the retry counter, saturating at the budget. Returns the new value.
    pub fn advance_retry(&self) -> u8 {
        let next = self.retry_count().saturating_add(1).min(self.retry);
        self.retry_count.store(next, Ordering::Release);
        next
    }

    /// Timer state owned by this request
    pub fn timer_slot(&self) -> &TimerSlot {
        &self.timer
    }

    /// Whether the request currently waits in the ready queue
    pub fn is_queued(&self) -> bool {
        self.queued.load(Ordering::Acquire)
    }

    /// Flag the request as queued; false if it already was
    pub(crate) fn mark_queued(&self) -> bool {
        !self.queued.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn clear_queued(&self) {
        self.queued.store(false, Ordering::Release);
    }

    /// Snapshot of parameters and counters
    pub fn snapshot(&self) -> PollResult {
        PollResult {
            slave_id: self.slave_id,
            function: self.function,
            address: self.address,
            quantity: self.quantity,
            scan_rate: self.scan_rate,
            tx_count: self.tx_count(),
            err_count: self.err_count(),
        }
    }
}
