//! # Transport
//!
//! Implementations of the [`contracts::Transport`] capability.
//!
//! - [`SimulatedTransport`]: in-process device image with failure injection
//!   and in-flight instrumentation, used by tests and the `simulated` CLI mode
//! - `TcpTransport`: Modbus TCP through `tokio-modbus` (feature `tokio-modbus`)

pub mod codec;
mod simulated;
#[cfg(feature = "tokio-modbus")]
mod tcp;

pub use codec::{pack_bits, pack_registers, unpack_bits, unpack_registers};
pub use simulated::{CallRecord, Outcome, SimulatedConfig, SimulatedProbe, SimulatedTransport};
#[cfg(feature = "tokio-modbus")]
pub use tcp::TcpTransport;
