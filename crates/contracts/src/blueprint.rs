//! PollerBlueprint - Config Loader output
//!
//! Describes a complete polling setup: client tuning, transport and gather jobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::GatherJob;

/// Default ready queue capacity
pub const DEFAULT_READY_QUEUE_CAPACITY: usize = 128;

/// Default jitter upper bound in milliseconds
pub const DEFAULT_JITTER_MAX_MS: u64 = 50;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete polling blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Client tuning
    #[serde(default)]
    pub client: ClientSection,

    /// Transport selection
    pub transport: TransportConfig,

    /// Gather jobs
    pub jobs: Vec<JobConfig>,
}

/// Client tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientSection {
    /// Ready queue capacity, must be >= 1
    #[serde(default = "default_ready_queue_capacity")]
    #[validate(range(min = 1, message = "ready_queue_capacity must be >= 1"))]
    pub ready_queue_capacity: usize,

    /// Upper bound of the random re-enqueue / fast retry delay
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            ready_queue_capacity: DEFAULT_READY_QUEUE_CAPACITY,
            jitter_max_ms: DEFAULT_JITTER_MAX_MS,
        }
    }
}

fn default_ready_queue_capacity() -> usize {
    DEFAULT_READY_QUEUE_CAPACITY
}

fn default_jitter_max_ms() -> u64 {
    DEFAULT_JITTER_MAX_MS
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport type
    pub kind: TransportKind,

    /// Socket address, required for `tcp`
    #[serde(default)]
    pub address: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    1000
}

impl TransportConfig {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Transport type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// In-process simulated device
    Simulated,
    /// Modbus TCP
    Tcp,
}

/// One gather job as written in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub slave_id: u8,

    /// Raw read function code (1..=4)
    pub function_code: u8,

    pub address: u16,

    pub quantity: u16,

    /// Scan rate in milliseconds, 0 = one-shot
    #[serde(default)]
    pub scan_rate_ms: u64,

    /// Fast retry budget after a failure
    #[serde(default)]
    pub retry: u8,
}

impl JobConfig {
    /// Convert into the runtime job type
    pub fn to_gather_job(&self) -> GatherJob {
        GatherJob {
            slave_id: self.slave_id,
            function_code: self.function_code,
            address: self.address,
            quantity: self.quantity,
            scan_rate: Duration::from_millis(self.scan_rate_ms),
            retry: self.retry,
        }
    }
}

impl PollerBlueprint {
    /// All jobs converted to runtime jobs, in file order
    pub fn gather_jobs(&self) -> Vec<GatherJob> {
        self.jobs.iter().map(JobConfig::to_gather_job).collect()
    }

    /// Jitter upper bound
    pub fn jitter_max(&self) -> Duration {
        Duration::from_millis(self.client.jitter_max_ms)
    }
}
