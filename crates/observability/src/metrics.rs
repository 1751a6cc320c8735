//! Poller metrics
//!
//! Prometheus recording helpers plus an in-memory aggregator of poll results
//! used for end-of-run summaries.

use std::collections::BTreeMap;
use std::time::Instant;

use contracts::PollResult;
use metrics::{counter, gauge, histogram};

/// Record one dispatched transaction
pub fn record_request(function: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "mbpoll_requests_total",
        "function" => function.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record how long one transport call took
pub fn record_dispatch_latency_ms(function: &str, latency_ms: f64) {
    histogram!(
        "mbpoll_dispatch_latency_ms",
        "function" => function.to_string()
    )
    .record(latency_ms);
}

/// Record a transaction that panicked inside the dispatcher
pub fn record_fault(function: &str) {
    counter!("mbpoll_faults_total", "function" => function.to_string()).increment(1);
}

/// Record a fire deferred because the ready queue was full
pub fn record_queue_full() {
    counter!("mbpoll_queue_full_total").increment(1);
}

/// Current ready queue depth
pub fn record_queue_depth(depth: usize) {
    gauge!("mbpoll_ready_queue_depth").set(depth as f64);
}

/// Record a rescheduling decision (`fast_retry`, `cadence` or `dormant`)
pub fn record_reschedule(kind: &'static str) {
    counter!("mbpoll_reschedules_total", "kind" => kind).increment(1);
}

/// Identifies one sub-request range in summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetKey {
    pub slave_id: u8,
    pub function_code: u8,
    pub address: u16,
    pub quantity: u16,
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "slave={} fc=0x{:02X} [{}..+{}]",
            self.slave_id, self.function_code, self.address, self.quantity
        )
    }
}

#[derive(Debug, Clone, Default)]
struct TargetState {
    results: u64,
    failures: u64,
    last_seen: Option<Instant>,
    interval_ms: RunningStats,
    tx_count: u64,
    err_count: u64,
}

/// Aggregates poll results in memory.
///
/// Besides success and failure counts it tracks the observed interval
/// between consecutive results of the same range, which shows the cadence
/// actually achieved against the configured scan rate.
#[derive(Debug, Clone, Default)]
pub struct PollMetricsAggregator {
    total_results: u64,
    total_failures: u64,
    targets: BTreeMap<TargetKey, TargetState>,
}

impl PollMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one result observed now
    pub fn update(&mut self, failed: bool, result: &PollResult) {
        self.update_at(failed, result, Instant::now());
    }

    /// Fold in one result observed at `now`
    pub fn update_at(&mut self, failed: bool, result: &PollResult, now: Instant) {
        self.total_results += 1;
        if failed {
            self.total_failures += 1;
        }

        let key = TargetKey {
            slave_id: result.slave_id,
            function_code: result.function.code(),
            address: result.address,
            quantity: result.quantity,
        };
        let state = self.targets.entry(key).or_default();
        state.results += 1;
        if failed {
            state.failures += 1;
        }
        if let Some(previous) = state.last_seen.replace(now) {
            state
                .interval_ms
                .push(now.saturating_duration_since(previous).as_secs_f64() * 1000.0);
        }
        state.tx_count = result.tx_count;
        state.err_count = result.err_count;
    }

    pub fn total_results(&self) -> u64 {
        self.total_results
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    /// Build a summary report
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_results: self.total_results,
            total_failures: self.total_failures,
            failure_rate: percentage(self.total_failures, self.total_results),
            targets: self
                .targets
                .iter()
                .map(|(key, state)| TargetSummary {
                    key: *key,
                    results: state.results,
                    failures: state.failures,
                    tx_count: state.tx_count,
                    err_count: state.err_count,
                    interval_ms: StatsSummary::from(&state.interval_ms),
                })
                .collect(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Per-range line of a [`MetricsSummary`]
#[derive(Debug, Clone)]
pub struct TargetSummary {
    pub key: TargetKey,
    pub results: u64,
    pub failures: u64,
    /// Lifetime transaction count reported by the latest result
    pub tx_count: u64,
    /// Lifetime error count reported by the latest result
    pub err_count: u64,
    pub interval_ms: StatsSummary,
}

/// Summary of everything an aggregator has seen
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_results: u64,
    pub total_failures: u64,
    pub failure_rate: f64,
    pub targets: Vec<TargetSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Poll Summary ===")?;
        writeln!(f, "Results: {}", self.total_results)?;
        writeln!(
            f,
            "Failures: {} ({:.2}%)",
            self.total_failures, self.failure_rate
        )?;
        for target in &self.targets {
            writeln!(
                f,
                "  {}: results={} failures={} tx={} err={} interval_ms: {}",
                target.key,
                target.results,
                target.failures,
                target.tx_count,
                target.err_count,
                target.interval_ms
            )?;
        }
        Ok(())
    }
}

/// Snapshot of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// Online mean and variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance; zero below two samples
    pub fn variance(&self) -> f64 {
        match self.count {
            0 | 1 => 0.0,
            n => self.m2 / (n - 1) as f64,
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
