//! Modbus protocol limits and the supported read function codes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Lowest addressable slave id (0 is broadcast, which reads cannot use)
pub const SLAVE_ID_MIN: u8 = 1;

/// Highest addressable slave id
pub const SLAVE_ID_MAX: u8 = 247;

/// Maximum coils / discrete inputs per read request
pub const READ_BITS_QUANTITY_MAX: u16 = 2000;

/// Maximum holding / input registers per read request
pub const READ_REGISTERS_QUANTITY_MAX: u16 = 125;

/// Read function codes the scheduler can gather
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FunctionCode {
    /// 0x01
    ReadCoils = 0x01,
    /// 0x02
    ReadDiscreteInputs = 0x02,
    /// 0x03
    ReadHoldingRegisters = 0x03,
    /// 0x04
    ReadInputRegisters = 0x04,
}

impl FunctionCode {
    /// All supported function codes, in code order
    pub const ALL: [FunctionCode; 4] = [
        FunctionCode::ReadCoils,
        FunctionCode::ReadDiscreteInputs,
        FunctionCode::ReadHoldingRegisters,
        FunctionCode::ReadInputRegisters,
    ];

    /// Raw function code byte
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the function reads single bits (coils / discrete inputs)
    #[inline]
    pub fn is_bit_access(self) -> bool {
        matches!(self, Self::ReadCoils | Self::ReadDiscreteInputs)
    }

    /// Maximum quantity a single request of this function may carry
    #[inline]
    pub fn quantity_max(self) -> u16 {
        if self.is_bit_access() {
            READ_BITS_QUANTITY_MAX
        } else {
            READ_REGISTERS_QUANTITY_MAX
        }
    }

    /// Stable lowercase name, used as a log field and metrics label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadCoils => "read_coils",
            Self::ReadDiscreteInputs => "read_discrete_inputs",
            Self::ReadHoldingRegisters => "read_holding_registers",
            Self::ReadInputRegisters => "read_input_registers",
        }
    }

    /// Number of payload bytes a successful read of `quantity` items carries
    pub fn payload_len(self, quantity: u16) -> usize {
        let quantity = usize::from(quantity);
        if self.is_bit_access() {
            quantity.div_ceil(8)
        } else {
            quantity * 2
        }
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = ContractError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(Self::ReadCoils),
            0x02 => Ok(Self::ReadDiscreteInputs),
            0x03 => Ok(Self::ReadHoldingRegisters),
            0x04 => Ok(Self::ReadInputRegisters),
            other => Err(ContractError::InvalidFunctionCode {
                function_code: other,
            }),
        }
    }
}

impl From<FunctionCode> for u8 {
    fn from(function: FunctionCode) -> Self {
        function.code()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a slave id against the addressable range
pub fn validate_slave_id(slave_id: u8) -> Result<(), ContractError> {
    if (SLAVE_ID_MIN..=SLAVE_ID_MAX).contains(&slave_id) {
        Ok(())
    } else {
        Err(ContractError::InvalidSlaveId {
            slave_id,
            min: SLAVE_ID_MIN,
            max: SLAVE_ID_MAX,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_code_round_trip() {
        for function in FunctionCode::ALL {
            assert_eq!(FunctionCode::try_from(function.code()).unwrap(), function);
        }
    }

    #[test]
    fn test_unsupported_function_codes_rejected() {
        for code in [0x00, 0x05, 0x06, 0x0f, 0x10, 0x18, 0xff] {
            let err = FunctionCode::try_from(code).unwrap_err();
            assert!(matches!(
                err,
                ContractError::InvalidFunctionCode { function_code } if function_code == code
            ));
        }
    }

    #[test]
    fn test_quantity_limits() {
        assert_eq!(FunctionCode::ReadCoils.quantity_max(), 2000);
        assert_eq!(FunctionCode::ReadDiscreteInputs.quantity_max(), 2000);
        assert_eq!(FunctionCode::ReadHoldingRegisters.quantity_max(), 125);
        assert_eq!(FunctionCode::ReadInputRegisters.quantity_max(), 125);
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(FunctionCode::ReadCoils.payload_len(1), 1);
        assert_eq!(FunctionCode::ReadCoils.payload_len(8), 1);
        assert_eq!(FunctionCode::ReadCoils.payload_len(9), 2);
        assert_eq!(FunctionCode::ReadInputRegisters.payload_len(10), 20);
    }

    #[test]
    fn test_slave_id_bounds() {
        assert!(validate_slave_id(0).is_err());
        assert!(validate_slave_id(1).is_ok());
        assert!(validate_slave_id(247).is_ok());
        assert!(validate_slave_id(248).is_err());
    }
}
