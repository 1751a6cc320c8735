//! Modbus TCP transport backed by `tokio-modbus`

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, FunctionCode, Transport};
use tokio_modbus::client::{tcp, Client, Context, Reader};
use tokio_modbus::prelude::{Slave, SlaveContext};
use tracing::{debug, instrument};

use crate::codec::{pack_bits, pack_registers};

/// Modbus TCP client. Every request is bounded by `timeout`.
pub struct TcpTransport {
    address: SocketAddr,
    timeout: Duration,
    context: Option<Context>,
}

impl TcpTransport {
    pub fn new(address: SocketAddr, timeout: Duration) -> Self {
        Self {
            address,
            timeout,
            context: None,
        }
    }

    fn context(&mut self, slave_id: u8, function: FunctionCode) -> Result<&mut Context, ContractError> {
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| ContractError::transport(slave_id, function.code(), "not connected"))?;
        context.set_slave(Slave(slave_id));
        Ok(context)
    }
}

/// Flatten timeout, I/O and exception layers into one error
fn flatten<T>(
    slave_id: u8,
    function: FunctionCode,
    response: Result<tokio_modbus::Result<T>, tokio::time::error::Elapsed>,
) -> Result<T, ContractError> {
    match response {
        Err(_) => Err(ContractError::transport(slave_id, function.code(), "request timed out")),
        Ok(Err(err)) => Err(ContractError::transport(slave_id, function.code(), err.to_string())),
        Ok(Ok(Err(exception))) => Err(ContractError::transport(
            slave_id,
            function.code(),
            format!("exception response: {exception}"),
        )),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}

impl Transport for TcpTransport {
    #[instrument(name = "tcp_connect", skip(self), fields(address = %self.address))]
    async fn connect(&mut self) -> Result<(), ContractError> {
        let context = tokio::time::timeout(self.timeout, tcp::connect(self.address))
            .await
            .map_err(|_| ContractError::connection(format!("connect to {} timed out", self.address)))?
            .map_err(|e| ContractError::connection(format!("connect to {}: {e}", self.address)))?;
        self.context = Some(context);
        debug!("modbus tcp connected");
        Ok(())
    }

    #[instrument(name = "tcp_close", skip(self), fields(address = %self.address))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut context) = self.context.take() {
            context
                .disconnect()
                .await
                .map_err(|e| ContractError::connection(e.to_string()))?;
        }
        Ok(())
    }

    async fn read_coils(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError> {
        let function = FunctionCode::ReadCoils;
        let timeout = self.timeout;
        let context = self.context(slave_id, function)?;
        let response = tokio::time::timeout(timeout, context.read_coils(address, quantity)).await;
        Ok(pack_bits(&flatten(slave_id, function, response)?))
    }

    async fn read_discrete_inputs(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError> {
        let function = FunctionCode::ReadDiscreteInputs;
        let timeout = self.timeout;
        let context = self.context(slave_id, function)?;
        let response =
            tokio::time::timeout(timeout, context.read_discrete_inputs(address, quantity)).await;
        Ok(pack_bits(&flatten(slave_id, function, response)?))
    }

    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError> {
        let function = FunctionCode::ReadHoldingRegisters;
        let timeout = self.timeout;
        let context = self.context(slave_id, function)?;
        let response =
            tokio::time::timeout(timeout, context.read_holding_registers(address, quantity)).await;
        Ok(pack_registers(&flatten(slave_id, function, response)?))
    }

    async fn read_input_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Bytes, ContractError> {
        let function = FunctionCode::ReadInputRegisters;
        let timeout = self.timeout;
        let context = self.context(slave_id, function)?;
        let response =
            tokio::time::timeout(timeout, context.read_input_registers(address, quantity)).await;
        Ok(pack_registers(&flatten(slave_id, function, response)?))
    }
}
