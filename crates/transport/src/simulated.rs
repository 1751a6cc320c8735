//! Simulated transport
//!
//! An in-process Modbus device. Tests script failures and inspect call
//! counters through a [`SimulatedProbe`], which stays usable after the
//! transport itself has been moved into the dispatcher.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, FunctionCode, Transport};
use tracing::{instrument, trace};

use crate::codec::{pack_bits, pack_registers};

/// What a read call does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Answer from the device image
    Respond,
    /// Fail with a transport error
    Fail(String),
    /// Panic inside the call
    Panic(String),
}

/// Simulated transport configuration (can inject failures)
#[derive(Debug, Default, Clone)]
pub struct SimulatedConfig {
    /// Time every read takes
    pub latency: Duration,
    /// `connect` fails
    pub fail_connect: bool,
    /// `close` fails
    pub fail_close: bool,
}

/// One read issued against the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRecord {
    pub slave_id: u8,
    pub function: FunctionCode,
    pub address: u16,
    pub quantity: u16,
}

type RangeKey = (u8, FunctionCode, u16);

#[derive(Default)]
struct DeviceImage {
    coils: HashMap<(u8, u16), bool>,
    discrete_inputs: HashMap<(u8, u16), bool>,
    holding_registers: HashMap<(u8, u16), u16>,
    input_registers: HashMap<(u8, u16), u16>,
}

#[derive(Default)]
struct Script {
    /// Consumed one per call, before `sticky`
    queued: HashMap<RangeKey, VecDeque<Outcome>>,
    sticky: HashMap<RangeKey, Outcome>,
}

#[derive(Default)]
struct SimState {
    image: Mutex<DeviceImage>,
    script: Mutex<Script>,
    calls: Mutex<Vec<CallRecord>>,
    connected: AtomicBool,
    closed: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls_after_close: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimState {
    fn next_outcome(&self, key: RangeKey) -> Outcome {
        let mut script = lock(&self.script);
        if let Some(outcome) = script.queued.get_mut(&key).and_then(VecDeque::pop_front) {
            return outcome;
        }
        script.sticky.get(&key).cloned().unwrap_or(Outcome::Respond)
    }

    fn payload(&self, call: &CallRecord) -> Bytes {
        let image = lock(&self.image);
        let addresses = (0..call.quantity).map(|offset| call.address.wrapping_add(offset));
        let bits = |table: &HashMap<(u8, u16), bool>| -> Vec<bool> {
            addresses
                .clone()
                .map(|a| table.get(&(call.slave_id, a)).copied().unwrap_or(false))
                .collect()
        };
        let registers = |table: &HashMap<(u8, u16), u16>| -> Vec<u16> {
            addresses
                .clone()
                .map(|a| table.get(&(call.slave_id, a)).copied().unwrap_or(0))
                .collect()
        };

        match call.function {
            FunctionCode::ReadCoils => pack_bits(&bits(&image.coils)),
            FunctionCode::ReadDiscreteInputs => pack_bits(&bits(&image.discrete_inputs)),
            FunctionCode::ReadHoldingRegisters => {
                pack_registers(&registers(&image.holding_registers))
            }
            FunctionCode::ReadInputRegisters => pack_registers(&registers(&image.input_registers)),
        }
    }
}

/// Keeps the in-flight counter honest even when a scripted panic unwinds
struct InFlight<'a>(&'a SimState);

impl<'a> InFlight<'a> {
    fn enter(state: &'a SimState) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-process Modbus device
pub struct SimulatedTransport {
    config: SimulatedConfig,
    state: Arc<SimState>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::with_config(SimulatedConfig::default())
    }

    pub fn with_config(config: SimulatedConfig) -> Self {
        Self {
            config,
            state: Arc::new(SimState::default()),
        }
    }

    /// Handle for scripting and inspection
    pub fn probe(&self) -> SimulatedProbe {
        SimulatedProbe {
            state: self.state.clone(),
        }
    }

    async fn read(
        &mut self,
        function: FunctionCode,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError> {
        let state = self.state.clone();
        let call = CallRecord {
            slave_id,
            function,
            address,
            quantity,
        };
        lock(&state.calls).push(call);
        if state.closed.load(Ordering::SeqCst) {
            state.calls_after_close.fetch_add(1, Ordering::SeqCst);
        }
        if !state.connected.load(Ordering::SeqCst) {
            return Err(ContractError::connection("not connected"));
        }

        let _in_flight = InFlight::enter(&state);
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        match state.next_outcome((slave_id, function, address)) {
            Outcome::Respond => {
                trace!(slave_id, address, quantity, function = %function, "simulated read");
                Ok(state.payload(&call))
            }
            Outcome::Fail(message) => Err(ContractError::transport(
                slave_id,
                function.code(),
                message,
            )),
            Outcome::Panic(message) => panic!("{message}"),
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimulatedTransport {
    #[instrument(name = "simulated_connect", skip(self))]
    async fn connect(&mut self) -> Result<(), ContractError> {
        if self.config.fail_connect {
            return Err(ContractError::connection("simulated connect failure"));
        }
        self.state.closed.store(false, Ordering::SeqCst);
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    #[instrument(name = "simulated_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.state.connected.store(false, Ordering::SeqCst);
        self.state.closed.store(true, Ordering::SeqCst);
        if self.config.fail_close {
            return Err(ContractError::connection("simulated close failure"));
        }
        Ok(())
    }

    async fn read_coils(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError> {
        self.read(FunctionCode::ReadCoils, slave_id, address, quantity)
            .await
    }

    async fn read_discrete_inputs(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError> {
        self.read(FunctionCode::ReadDiscreteInputs, slave_id, address, quantity)
            .await
    }

    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError> {
        self.read(FunctionCode::ReadHoldingRegisters, slave_id, address, quantity)
            .await
    }

    async fn read_input_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError> {
        self.read(FunctionCode::ReadInputRegisters, slave_id, address, quantity)
            .await
    }
}

/// Shared view of a [`SimulatedTransport`]
#[derive(Clone)]
pub struct SimulatedProbe {
    state: Arc<SimState>,
}

impl SimulatedProbe {
    pub fn set_coil(&self, slave_id: u8, address: u16, value: bool) {
        lock(&self.state.image)
            .coils
            .insert((slave_id, address), value);
    }

    pub fn set_discrete_input(&self, slave_id: u8, address: u16, value: bool) {
        lock(&self.state.image)
            .discrete_inputs
            .insert((slave_id, address), value);
    }

    pub fn set_holding_register(&self, slave_id: u8, address: u16, value: u16) {
        lock(&self.state.image)
            .holding_registers
            .insert((slave_id, address), value);
    }

    pub fn set_input_register(&self, slave_id: u8, address: u16, value: u16) {
        lock(&self.state.image)
            .input_registers
            .insert((slave_id, address), value);
    }

    /// Queue outcomes for the next calls on the range starting at `address`
    pub fn script(
        &self,
        slave_id: u8,
        function: FunctionCode,
        address: u16,
        outcomes: impl IntoIterator<Item = Outcome>,
    ) {
        lock(&self.state.script)
            .queued
            .entry((slave_id, function, address))
            .or_default()
            .extend(outcomes);
    }

    /// Outcome used once the queued script of a range runs out
    pub fn set_default_outcome(
        &self,
        slave_id: u8,
        function: FunctionCode,
        address: u16,
        outcome: Outcome,
    ) {
        let mut script = lock(&self.state.script);
        if outcome == Outcome::Respond {
            script.sticky.remove(&(slave_id, function, address));
        } else {
            script.sticky.insert((slave_id, function, address), outcome);
        }
    }

    /// Every read issued so far, in order
    pub fn calls(&self) -> Vec<CallRecord> {
        lock(&self.state.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.state.calls).len()
    }

    /// Reads issued for one function code
    pub fn calls_for(&self, function: FunctionCode) -> usize {
        lock(&self.state.calls)
            .iter()
            .filter(|call| call.function == function)
            .count()
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent reads ever observed
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Reads issued after `close`
    pub fn calls_after_close(&self) -> u64 {
        self.state.calls_after_close.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}
