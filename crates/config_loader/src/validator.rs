//! Configuration validation
//!
//! Rules:
//! - `[client]` options in range
//! - tcp transport has a parseable socket address, timeout > 0
//! - at least one job
//! - every job passes the same checks as a programmatic submission
//!
//! Identical jobs are accepted, as `Client::add_gather_job` accepts them.

use std::net::SocketAddr;

use contracts::{ContractError, PollerBlueprint, TransportKind};
use ::validator::Validate;

/// Validate a PollerBlueprint
///
/// Returns the first error encountered.
pub fn validate(blueprint: &PollerBlueprint) -> Result<(), ContractError> {
    validate_client(blueprint)?;
    validate_transport(blueprint)?;
    validate_jobs(blueprint)?;
    Ok(())
}

fn validate_client(blueprint: &PollerBlueprint) -> Result<(), ContractError> {
    blueprint
        .client
        .validate()
        .map_err(|errors| match ContractError::from(errors) {
            ContractError::ConfigValidation { field, message } => {
                ContractError::config_validation(format!("client.{field}"), message)
            }
            other => other,
        })
}

fn validate_transport(blueprint: &PollerBlueprint) -> Result<(), ContractError> {
    let transport = &blueprint.transport;
    if transport.timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "transport.timeout_ms",
            "timeout_ms must be > 0",
        ));
    }

    if transport.kind == TransportKind::Tcp {
        let address = transport.address.as_deref().ok_or_else(|| {
            ContractError::config_validation("transport.address", "tcp transport requires an address")
        })?;
        address.parse::<SocketAddr>().map_err(|e| {
            ContractError::config_validation(
                "transport.address",
                format!("'{address}' is not a socket address: {e}"),
            )
        })?;
    }
    Ok(())
}

fn validate_jobs(blueprint: &PollerBlueprint) -> Result<(), ContractError> {
    if blueprint.jobs.is_empty() {
        return Err(ContractError::config_validation(
            "jobs",
            "at least one job is required",
        ));
    }

    for (idx, job) in blueprint.jobs.iter().enumerate() {
        job.to_gather_job().validate().map_err(|e| {
            let field = match e {
                ContractError::InvalidSlaveId { .. } => "slave_id",
                ContractError::InvalidFunctionCode { .. } => "function_code",
                _ => "quantity",
            };
            ContractError::config_validation(format!("jobs[{idx}].{field}"), e.to_string())
        })?;
    }
    Ok(())
}
