//! `run` command implementation.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use contracts::{Fault, FunctionCode, PollerBlueprint, Transport, TransportKind};
use poller::{Client, ClientOptions};
use transport::{SimulatedProbe, SimulatedTransport};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::session::{RunStats, StatsHandler};

/// Execute the `run` command
pub async fn run_poller(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref address) = args.address {
        address.parse::<std::net::SocketAddr>().map_err(|e| {
            CliError::invalid_override("address", address.as_str(), e.to_string())
        })?;
        info!(address = %address, "Overriding transport address from CLI");
        blueprint.transport.address = Some(address.clone());
    }

    info!(
        transport = ?blueprint.transport.kind,
        address = blueprint.transport.address.as_deref().unwrap_or("-"),
        jobs = blueprint.jobs.len(),
        ready_queue_capacity = blueprint.client.ready_queue_capacity,
        jitter_max_ms = blueprint.client.jitter_max_ms,
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)
            .context("Failed to start metrics exporter")?;
    }

    let duration = (args.duration != 0).then(|| Duration::from_secs(args.duration));

    let stats = match blueprint.transport.kind {
        TransportKind::Simulated => {
            let transport = SimulatedTransport::new();
            seed_device_image(&transport.probe(), &blueprint);
            poll_until_stopped(transport, &blueprint, duration).await?
        }
        TransportKind::Tcp => run_tcp(&blueprint, duration).await?,
    };

    info!(
        dispatched = stats.client.dispatch.dispatched,
        failed = stats.client.dispatch.failed,
        faults = stats.client.dispatch.faults,
        duration_secs = stats.duration.as_secs_f64(),
        "Polling finished"
    );
    stats.print_summary();

    Ok(())
}

#[cfg(feature = "tcp")]
async fn run_tcp(blueprint: &PollerBlueprint, duration: Option<Duration>) -> Result<RunStats> {
    let address = blueprint
        .transport
        .address
        .as_deref()
        .context("tcp transport requires an address")?
        .parse::<std::net::SocketAddr>()
        .context("invalid tcp transport address")?;
    let transport = transport::TcpTransport::new(address, blueprint.transport.timeout());
    poll_until_stopped(transport, blueprint, duration).await
}

#[cfg(not(feature = "tcp"))]
async fn run_tcp(_blueprint: &PollerBlueprint, _duration: Option<Duration>) -> Result<RunStats> {
    Err(CliError::unsupported_transport("tcp", "tcp").into())
}

/// Start a client, submit every job and poll until a signal or the deadline
async fn poll_until_stopped<T: Transport + 'static>(
    transport: T,
    blueprint: &PollerBlueprint,
    duration: Option<Duration>,
) -> Result<RunStats> {
    let handler = Arc::new(StatsHandler::new("mbpoll"));
    let options = ClientOptions::from_section(&blueprint.client)
        .with_handler(handler.clone())
        .with_fault_hook(Arc::new(|fault: &Fault| {
            warn!(
                slave_id = fault.slave_id,
                function = %fault.function,
                address = fault.address,
                message = %fault.message,
                "Dispatch fault"
            );
        }));

    let mut client = Client::new(transport, options).context("Failed to create client")?;
    client.start().await.context("Failed to start client")?;

    for (index, job) in blueprint.gather_jobs().into_iter().enumerate() {
        if let Err(e) = client.add_gather_job(job) {
            // best effort: close before reporting the rejected job
            let _ = client.close().await;
            return Err(e).with_context(|| format!("Failed to schedule jobs[{index}]"));
        }
    }

    let started = Instant::now();
    info!(sub_requests = client.stats().sub_requests, "Polling started");

    tokio::select! {
        _ = setup_shutdown_signal() => {
            warn!("Received shutdown signal, stopping poller...");
        }
        _ = sleep_or_forever(duration) => {
            info!("Run duration elapsed, stopping poller...");
        }
    }

    let client_stats = client.stats();
    let sub_requests = client.sub_requests();
    client.close().await.context("Failed to close client")?;

    Ok(RunStats {
        duration: started.elapsed(),
        client: client_stats,
        sub_requests,
        results: handler.summary(),
    })
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Fill the simulated device with a recognisable pattern for every job range
fn seed_device_image(probe: &SimulatedProbe, blueprint: &PollerBlueprint) {
    for job in &blueprint.jobs {
        let Ok(function) = FunctionCode::try_from(job.function_code) else {
            continue;
        };
        let end = u32::from(job.address) + u32::from(job.quantity);
        for address in (u32::from(job.address)..end).filter_map(|a| u16::try_from(a).ok()) {
            match function {
                FunctionCode::ReadCoils => probe.set_coil(job.slave_id, address, address % 2 == 0),
                FunctionCode::ReadDiscreteInputs => {
                    probe.set_discrete_input(job.slave_id, address, address % 3 == 0)
                }
                FunctionCode::ReadHoldingRegisters => {
                    probe.set_holding_register(job.slave_id, address, address)
                }
                FunctionCode::ReadInputRegisters => {
                    probe.set_input_register(job.slave_id, address, address.wrapping_mul(10))
                }
            }
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM; a handler that fails to install never resolves
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
