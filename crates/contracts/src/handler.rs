//! Handler trait - observer of payloads and per-attempt results

use std::sync::Arc;

use crate::{ContractError, FunctionCode, PollResult};

/// Observer notified by the dispatcher.
///
/// All methods default to no-ops and are best-effort notifications: nothing
/// they do influences scheduling. They run on the dispatcher task, so slow
/// implementations delay every other sub-request.
pub trait Handler: Send + Sync {
    /// Successful read of coils
    fn on_read_coils(&self, _slave_id: u8, _address: u16, _quantity: u16, _data: &[u8]) {}

    /// Successful read of discrete inputs
    fn on_read_discrete_inputs(&self, _slave_id: u8, _address: u16, _quantity: u16, _data: &[u8]) {
    }

    /// Successful read of holding registers
    fn on_read_holding_registers(
        &self,
        _slave_id: u8,
        _address: u16,
        _quantity: u16,
        _data: &[u8],
    ) {
    }

    /// Successful read of input registers
    fn on_read_input_registers(&self, _slave_id: u8, _address: u16, _quantity: u16, _data: &[u8]) {
    }

    /// Outcome of every attempt, successful or not
    fn on_result(&self, _error: Option<&ContractError>, _result: &PollResult) {}
}

/// Handler that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NopHandler;

impl Handler for NopHandler {}

/// A panic caught while dispatching one sub-request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub slave_id: u8,
    pub function: FunctionCode,
    pub address: u16,
    /// Rendered panic payload
    pub message: String,
}

/// Hook receiving dispatch faults
pub type FaultHook = Arc<dyn Fn(&Fault) + Send + Sync>;
