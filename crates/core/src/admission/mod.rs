//! Admission control: path-routed, per-client rate limiting.
//!
//! Incoming requests are classified by path into named zones. Each zone keeps
//! one leaky bucket per client, created lazily and evicted after inactivity.
//! When several route patterns match a path, the most specific (longest
//! prefix) zone governs exclusively.

mod bucket;
mod controller;
mod routes;

pub use bucket::LeakyBucket;
pub use controller::AdmissionController;
pub use routes::RouteTable;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from admission control.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The client exceeded the zone's rate limit. Distinct from validation
    /// and auth failures so callers can map it to 429.
    #[error("rate limit exceeded for zone '{zone}'")]
    Rejected { zone: String, retry_after_ms: u64 },

    /// A route references a zone that is not configured.
    #[error("admission route references unknown zone '{0}'")]
    UnknownZone(String),
}

/// Admission configuration: zones, path routes, and bucket eviction.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdmissionConfig {
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,

    #[serde(default)]
    pub routes: Vec<ZoneRoute>,

    /// Buckets idle longer than this are evicted.
    #[serde(default = "default_idle_eviction_secs")]
    pub idle_eviction_secs: u64,

    /// How often the eviction sweep runs (milliseconds).
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_idle_eviction_secs() -> u64 {
    900
}

fn default_sweep_interval_ms() -> u64 {
    60_000
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            zones: Vec::new(),
            routes: Vec::new(),
            idle_eviction_secs: default_idle_eviction_secs(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// A named rate-limit zone.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZoneConfig {
    pub name: String,

    /// Continuous refill rate, in tokens per minute.
    pub rate_per_minute: f32,

    /// Maximum bucket capacity (burst size).
    pub burst: u32,

    /// When false the zone runs in shadow mode: exceeding requests are
    /// admitted but logged and counted.
    #[serde(default = "default_reject_on_exceed")]
    pub reject_on_exceed: bool,
}

fn default_reject_on_exceed() -> bool {
    true
}

/// Maps a path prefix to a zone. Longest prefix wins.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZoneRoute {
    pub path: String,
    pub zone: String,
}
