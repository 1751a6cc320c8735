//! `validate` command implementation.

use anyhow::{Context, Result};
use std::collections::HashMap;
use serde::Serialize;
use tracing::info;

use contracts::PollerBlueprint;
use scheduler::Splitter;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    transport: String,
    job_count: usize,
    sub_request_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult::invalid(
            config_path,
            format!("File not found: {}", args.config.display()),
        );
    }

    let blueprint = match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => blueprint,
        Err(e) => return ValidationResult::invalid(config_path, e.to_string()),
    };

    let splitter = Splitter::new();
    let mut sub_request_count = 0;
    for (index, job) in blueprint.gather_jobs().iter().enumerate() {
        match splitter.split(job) {
            Ok(requests) => sub_request_count += requests.len(),
            Err(e) => return ValidationResult::invalid(config_path, format!("jobs[{index}]: {e}")),
        }
    }

    let warnings = collect_warnings(&blueprint);
    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: (!warnings.is_empty()).then_some(warnings),
        summary: Some(ConfigSummary {
            version: format!("{:?}", blueprint.version),
            transport: format!("{:?}", blueprint.transport.kind),
            job_count: blueprint.jobs.len(),
            sub_request_count,
        }),
    }
}

impl ValidationResult {
    fn invalid(config_path: String, error: String) -> Self {
        Self {
            valid: false,
            config_path,
            error: Some(error),
            warnings: None,
            summary: None,
        }
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PollerBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.client.jitter_max_ms == 0 {
        warnings.push(
            "client.jitter_max_ms is 0 - retries and re-enqueues fire without delay".to_string(),
        );
    }

    for (index, job) in blueprint.jobs.iter().enumerate() {
        if job.scan_rate_ms == 0 {
            warnings.push(format!(
                "jobs[{index}] has scan_rate_ms = 0 - it is polled once and then goes dormant"
            ));
        }
        if job.retry == 1 {
            warnings.push(format!(
                "jobs[{index}] has retry = 1 - a single failure already exhausts the budget, \
                 so it never fast-retries"
            ));
        }
    }

    let mut first_seen = HashMap::new();
    for (index, job) in blueprint.jobs.iter().enumerate() {
        let key = (job.slave_id, job.function_code, job.address, job.quantity);
        let first = *first_seen.entry(key).or_insert(index);
        if first != index {
            warnings.push(format!(
                "jobs[{index}] polls the same range as jobs[{first}] - the device is read twice"
            ));
        }
    }

    if blueprint.jobs.len() > blueprint.client.ready_queue_capacity {
        warnings.push(format!(
            "{} jobs share a ready queue of capacity {} - expect deferred enqueues",
            blueprint.jobs.len(),
            blueprint.client.ready_queue_capacity
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Transport: {}", summary.transport);
            println!("  Jobs: {}", summary.job_count);
            println!("  Sub-requests: {}", summary.sub_request_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
