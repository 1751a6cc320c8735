//! Transport trait - the single-access link to the field devices
//!
//! The dispatcher is the only caller once the client is started, so
//! implementations need no internal locking.

use bytes::Bytes;

use crate::ContractError;

/// Read-only Modbus transport.
///
/// Payloads are the raw data bytes of the response: bits packed LSB-first,
/// registers big-endian.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Open the connection
    async fn connect(&mut self) -> Result<(), ContractError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), ContractError>;

    /// Function 0x01
    async fn read_coils(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError>;

    /// Function 0x02
    async fn read_discrete_inputs(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError>;

    /// Function 0x03
    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError>;

    /// Function 0x04
    async fn read_input_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError>;
}
