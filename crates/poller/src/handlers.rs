//! Built-in handlers

use contracts::{ContractError, Handler, PollResult};
use tracing::{debug, trace, warn};

/// Handler that logs payload sizes and results via tracing
#[derive(Debug, Clone)]
pub struct LogHandler {
    name: String,
}

impl LogHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_payload(&self, kind: &'static str, slave_id: u8, address: u16, quantity: u16, data: &[u8]) {
        trace!(
            handler = %self.name,
            kind,
            slave_id,
            address,
            quantity,
            bytes = data.len(),
            "payload received"
        );
    }
}

impl Handler for LogHandler {
    fn on_read_coils(&self, slave_id: u8, address: u16, quantity: u16, data: &[u8]) {
        self.log_payload("coils", slave_id, address, quantity, data);
    }

    fn on_read_discrete_inputs(&self, slave_id: u8, address: u16, quantity: u16, data: &[u8]) {
        self.log_payload("discrete_inputs", slave_id, address, quantity, data);
    }

    fn on_read_holding_registers(&self, slave_id: u8, address: u16, quantity: u16, data: &[u8]) {
        self.log_payload("holding_registers", slave_id, address, quantity, data);
    }

    fn on_read_input_registers(&self, slave_id: u8, address: u16, quantity: u16, data: &[u8]) {
        self.log_payload("input_registers", slave_id, address, quantity, data);
    }

    fn on_result(&self, error: Option<&ContractError>, result: &PollResult) {
        match error {
            None => debug!(
                handler = %self.name,
                slave_id = result.slave_id,
                function = %result.function,
                address = result.address,
                quantity = result.quantity,
                tx = result.tx_count,
                err = result.err_count,
                "poll ok"
            ),
            Some(error) => warn!(
                handler = %self.name,
                slave_id = result.slave_id,
                function = %result.function,
                address = result.address,
                quantity = result.quantity,
                tx = result.tx_count,
                err = result.err_count,
                error = %error,
                "poll failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FunctionCode;
    use std::time::Duration;

    #[test]
    fn test_log_handler_accepts_all_callbacks() {
        let handler = LogHandler::new("test");
        let result = PollResult {
            slave_id: 1,
            function: FunctionCode::ReadCoils,
            address: 0,
            quantity: 8,
            scan_rate: Duration::from_millis(100),
            tx_count: 2,
            err_count: 1,
        };
        handler.on_read_coils(1, 0, 8, &[0xFF]);
        handler.on_read_input_registers(1, 0, 1, &[0, 1]);
        handler.on_result(None, &result);
        handler.on_result(Some(&ContractError::transport(1, 1, "timeout")), &result);
    }
}
