//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{FunctionCode, JobConfig, PollerBlueprint};
use scheduler::Splitter;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    client: ClientInfo,
    transport: TransportInfo,
    jobs: Vec<JobInfo>,
}

#[derive(Serialize)]
struct ClientInfo {
    ready_queue_capacity: usize,
    jitter_max_ms: u64,
}

#[derive(Serialize)]
struct TransportInfo {
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    timeout_ms: u64,
}

#[derive(Serialize)]
struct JobInfo {
    slave_id: u8,
    function: String,
    address: u16,
    quantity: u16,
    scan_rate_ms: u64,
    retry: u8,
    sub_requests: Vec<RangeInfo>,
}

#[derive(Serialize)]
struct RangeInfo {
    address: u16,
    quantity: u16,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let info = build_config_info(&blueprint)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &PollerBlueprint) -> Result<ConfigInfo> {
    let splitter = Splitter::new();
    let jobs = blueprint
        .jobs
        .iter()
        .enumerate()
        .map(|(index, job)| {
            job_info(&splitter, job).with_context(|| format!("Failed to split jobs[{index}]"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ConfigInfo {
        version: format!("{:?}", blueprint.version),
        client: ClientInfo {
            ready_queue_capacity: blueprint.client.ready_queue_capacity,
            jitter_max_ms: blueprint.client.jitter_max_ms,
        },
        transport: TransportInfo {
            kind: format!("{:?}", blueprint.transport.kind),
            address: blueprint.transport.address.clone(),
            timeout_ms: blueprint.transport.timeout_ms,
        },
        jobs,
    })
}

fn job_info(splitter: &Splitter, job: &JobConfig) -> Result<JobInfo> {
    let function = FunctionCode::try_from(job.function_code)?;
    let sub_requests = splitter
        .split(&job.to_gather_job())?
        .iter()
        .map(|request| RangeInfo {
            address: request.address(),
            quantity: request.quantity(),
        })
        .collect();

    Ok(JobInfo {
        slave_id: job.slave_id,
        function: function.to_string(),
        address: job.address,
        quantity: job.quantity,
        scan_rate_ms: job.scan_rate_ms,
        retry: job.retry,
        sub_requests,
    })
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== mbpoll Configuration ===\n");

    println!("Client");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Ready queue capacity: {}", info.client.ready_queue_capacity);
    println!("   └─ Jitter max: {} ms", info.client.jitter_max_ms);

    println!("\nTransport");
    println!("   ├─ Kind: {}", info.transport.kind);
    println!(
        "   ├─ Address: {}",
        info.transport.address.as_deref().unwrap_or("-")
    );
    println!("   └─ Timeout: {} ms", info.transport.timeout_ms);

    println!("\nJobs ({})", info.jobs.len());
    for (i, job) in info.jobs.iter().enumerate() {
        let is_last = i == info.jobs.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        let cadence = if job.scan_rate_ms == 0 {
            "one-shot".to_string()
        } else {
            format!("every {} ms", job.scan_rate_ms)
        };
        println!(
            "   {} slave={} {} [{}..+{}] {}, retry={}",
            prefix, job.slave_id, job.function, job.address, job.quantity, cadence, job.retry
        );

        for (j, range) in job.sub_requests.iter().enumerate() {
            let range_prefix = if j == job.sub_requests.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            println!(
                "   {}  {} [{}..+{}]",
                child_prefix, range_prefix, range.address, range.quantity
            );
        }
    }

    println!();
}
