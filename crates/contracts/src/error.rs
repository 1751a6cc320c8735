//! Layered error definitions
//!
//! Categorized by source: validation / transport / config

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Validation Errors =====
    /// Slave id outside the addressable range
    #[error("slave id '{slave_id}' must be between '{min}' and '{max}'")]
    InvalidSlaveId { slave_id: u8, min: u8, max: u8 },

    /// Function code not in the supported read set
    #[error("invalid function code 0x{function_code:02x}")]
    InvalidFunctionCode { function_code: u8 },

    /// Empty job or address range past the end of the address space
    #[error("invalid range at address {address} quantity {quantity}: {message}")]
    InvalidRange {
        address: u16,
        quantity: u16,
        message: String,
    },

    /// Job submitted after the client was closed
    #[error("client closed")]
    ClientClosed,

    // ===== Transport Errors =====
    /// Transport connect / close failure
    #[error("transport connection error: {message}")]
    Connection { message: String },

    /// Read request failure
    #[error("transport error on slave {slave_id} function 0x{function_code:02x}: {message}")]
    Transport {
        slave_id: u8,
        function_code: u8,
        message: String,
    },

    /// Panic caught while dispatching, reported in place of a transport error
    #[error("dispatch fault: {message}")]
    DispatchFault { message: String },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create read failure error
    pub fn transport(slave_id: u8, function_code: u8, message: impl Into<String>) -> Self {
        Self::Transport {
            slave_id,
            function_code,
            message: message.into(),
        }
    }

    /// Create range error
    pub fn invalid_range(address: u16, quantity: u16, message: impl Into<String>) -> Self {
        Self::InvalidRange {
            address,
            quantity,
            message: message.into(),
        }
    }

    /// Whether the error was raised by submission-time validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidSlaveId { .. }
                | Self::InvalidFunctionCode { .. }
                | Self::InvalidRange { .. }
                | Self::ClientClosed
        )
    }
}

impl From<validator::ValidationErrors> for ContractError {
    /// Reports the first offending field, in name order
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let Some((field, field_errors)) = fields.first() else {
            return Self::config_validation("", errors.to_string());
        };
        let message = field_errors
            .first()
            .and_then(|e| e.message.as_ref())
            .map(|m| m.to_string())
            .unwrap_or_else(|| errors.to_string());
        Self::config_validation(field.to_string(), message)
    }
}
