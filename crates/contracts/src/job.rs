//! GatherJob - caller input, PollResult - per-attempt snapshot

use std::time::Duration;

use crate::{validate_slave_id, ContractError, FunctionCode};

/// A request to periodically read one address range from one slave.
///
/// `function_code` is the raw code so that unsupported codes can still be
/// submitted and rejected at validation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherJob {
    /// Slave id
    pub slave_id: u8,
    /// Raw read function code
    pub function_code: u8,
    /// First address of the range
    pub address: u16,
    /// Number of items in the range
    pub quantity: u16,
    /// Interval between attempts, zero for a one-shot job
    pub scan_rate: Duration,
    /// Fast retries allowed after a failure, zero disables them
    pub retry: u8,
}

impl GatherJob {
    /// One-shot job with no retries
    pub fn new(slave_id: u8, function: FunctionCode, address: u16, quantity: u16) -> Self {
        Self {
            slave_id,
            function_code: function.code(),
            address,
            quantity,
            scan_rate: Duration::ZERO,
            retry: 0,
        }
    }

    /// Set the scan rate
    pub fn with_scan_rate(mut self, scan_rate: Duration) -> Self {
        self.scan_rate = scan_rate;
        self
    }

    /// Set the retry budget
    pub fn with_retry(mut self, retry: u8) -> Self {
        self.retry = retry;
        self
    }

    /// Validate the job, returning its function code on success.
    ///
    /// # Errors
    /// - `InvalidSlaveId` when the slave id is not addressable
    /// - `InvalidFunctionCode` when the code is not a supported read
    /// - `InvalidRange` when the range is empty or runs past address 65535
    pub fn validate(&self) -> Result<FunctionCode, ContractError> {
        validate_slave_id(self.slave_id)?;
        let function = FunctionCode::try_from(self.function_code)?;

        if self.quantity == 0 {
            return Err(ContractError::invalid_range(
                self.address,
                self.quantity,
                "quantity must be > 0",
            ));
        }
        if u32::from(self.address) + u32::from(self.quantity) > u32::from(u16::MAX) + 1 {
            return Err(ContractError::invalid_range(
                self.address,
                self.quantity,
                "range exceeds the 16-bit address space",
            ));
        }
        Ok(function)
    }

    /// Whether the job runs once instead of periodically
    #[inline]
    pub fn is_one_shot(&self) -> bool {
        self.scan_rate.is_zero()
    }
}

/// Parameters and cumulative counters of one sub-request, reported after
/// every dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollResult {
    pub slave_id: u8,
    pub function: FunctionCode,
    pub address: u16,
    pub quantity: u16,
    pub scan_rate: Duration,
    /// Attempts sent so far
    pub tx_count: u64,
    /// Attempts failed so far
    pub err_count: u64,
}

impl PollResult {
    /// Attempts that succeeded so far
    pub fn ok_count(&self) -> u64 {
        self.tx_count.saturating_sub(self.err_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_job() {
        let job = GatherJob::new(1, FunctionCode::ReadHoldingRegisters, 0, 20)
            .with_scan_rate(Duration::from_millis(500))
            .with_retry(3);
        assert_eq!(job.validate().unwrap(), FunctionCode::ReadHoldingRegisters);
        assert!(!job.is_one_shot());
    }

    #[test]
    fn test_invalid_slave_id() {
        let job = GatherJob::new(0, FunctionCode::ReadCoils, 0, 1);
        assert!(matches!(
            job.validate(),
            Err(ContractError::InvalidSlaveId { slave_id: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_function_code() {
        let mut job = GatherJob::new(1, FunctionCode::ReadCoils, 0, 1);
        job.function_code = 0x06;
        assert!(matches!(
            job.validate(),
            Err(ContractError::InvalidFunctionCode { function_code: 0x06 })
        ));
    }

    #[test]
    fn test_range_checks() {
        let empty = GatherJob::new(1, FunctionCode::ReadCoils, 10, 0);
        assert!(matches!(
            empty.validate(),
            Err(ContractError::InvalidRange { .. })
        ));

        let overflow = GatherJob::new(1, FunctionCode::ReadCoils, 65_535, 2);
        assert!(matches!(
            overflow.validate(),
            Err(ContractError::InvalidRange { .. })
        ));

        let last = GatherJob::new(1, FunctionCode::ReadCoils, 65_535, 1);
        assert!(last.validate().is_ok());
    }

    #[test]
    fn test_validation_errors_classified() {
        assert!(ContractError::ClientClosed.is_validation());
        assert!(!ContractError::connection("down").is_validation());
    }
}
