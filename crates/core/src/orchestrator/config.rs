//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the creation orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Enable/disable the orchestrator.
    /// When disabled, submissions are refused with 503.
    #[serde(default)]
    pub enabled: bool,

    /// Size of the worker pool. Submission blocks briefly while acquiring a
    /// slot when all workers are busy.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Maximum time a job may stay in Processing before the watchdog forces
    /// it to Failed (seconds).
    #[serde(default = "default_max_processing_secs")]
    pub max_processing_secs: u64,

    /// How often the watchdog scans for stuck jobs (milliseconds).
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_ms: u64,

    /// How long terminal jobs are retained before eviction (seconds).
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// How often the retention sweep runs (milliseconds).
    #[serde(default = "default_retention_interval")]
    pub retention_interval_ms: u64,
}

fn default_max_workers() -> usize {
    4
}

fn default_max_processing_secs() -> u64 {
    3600 // 1 hour
}

fn default_watchdog_interval() -> u64 {
    30_000 // 30 seconds
}

fn default_retention_secs() -> u64 {
    86_400 // 24 hours
}

fn default_retention_interval() -> u64 {
    3_600_000 // 1 hour
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_workers: default_max_workers(),
            max_processing_secs: default_max_processing_secs(),
            watchdog_interval_ms: default_watchdog_interval(),
            retention_secs: default_retention_secs(),
            retention_interval_ms: default_retention_interval(),
        }
    }
}
