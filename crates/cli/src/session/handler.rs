//! Handler that logs every notification and aggregates results.

use std::sync::{Mutex, PoisonError};

use contracts::{ContractError, Handler, PollResult};
use observability::{MetricsSummary, PollMetricsAggregator};
use poller::LogHandler;

/// Forwards to a [`LogHandler`] and feeds a [`PollMetricsAggregator`]
pub struct StatsHandler {
    log: LogHandler,
    aggregator: Mutex<PollMetricsAggregator>,
}

impl StatsHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            log: LogHandler::new(name),
            aggregator: Mutex::new(PollMetricsAggregator::new()),
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        self.aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary()
    }
}

impl Handler for StatsHandler {
    fn on_read_coils(&self, slave_id: u8, address: u16, quantity: u16, data: &[u8]) {
        self.log.on_read_coils(slave_id, address, quantity, data);
    }

    fn on_read_discrete_inputs(&self, slave_id: u8, address: u16, quantity: u16, data: &[u8]) {
        self.log
            .on_read_discrete_inputs(slave_id, address, quantity, data);
    }

    fn on_read_holding_registers(&self, slave_id: u8, address: u16, quantity: u16, data: &[u8]) {
        self.log
            .on_read_holding_registers(slave_id, address, quantity, data);
    }

    fn on_read_input_registers(&self, slave_id: u8, address: u16, quantity: u16, data: &[u8]) {
        self.log
            .on_read_input_registers(slave_id, address, quantity, data);
    }

    fn on_result(&self, error: Option<&ContractError>, result: &PollResult) {
        self.log.on_result(error, result);
        self.aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(error.is_some(), result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FunctionCode;
    use std::time::Duration;

    fn result(tx: u64, err: u64) -> PollResult {
        PollResult {
            slave_id: 1,
            function: FunctionCode::ReadHoldingRegisters,
            address: 0,
            quantity: 10,
            scan_rate: Duration::from_millis(100),
            tx_count: tx,
            err_count: err,
        }
    }

    #[test]
    fn test_results_are_aggregated() {
        let handler = StatsHandler::new("test");
        handler.on_result(None, &result(1, 0));
        let error = ContractError::transport(1, 3, "timeout");
        handler.on_result(Some(&error), &result(2, 1));

        let summary = handler.summary();
        assert_eq!(summary.total_results, 2);
        assert_eq!(summary.total_failures, 1);
        assert_eq!(summary.targets.len(), 1);
    }
}
