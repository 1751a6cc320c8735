//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Transport kind not compiled into this binary
    #[error("transport '{kind}' is not available in this build (enable the '{feature}' feature)")]
    UnsupportedTransport { kind: String, feature: String },

    /// Invalid command-line override
    #[error("invalid --{flag} value '{value}': {message}")]
    InvalidOverride {
        flag: String,
        value: String,
        message: String,
    },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    #[cfg_attr(feature = "tcp", allow(dead_code))]
    pub fn unsupported_transport(kind: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::UnsupportedTransport {
            kind: kind.into(),
            feature: feature.into(),
        }
    }

    pub fn invalid_override(
        flag: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidOverride {
            flag: flag.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}
