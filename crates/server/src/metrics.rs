//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Fabrica server:
//! - HTTP request metrics (latency, counts, errors)
//! - Job counts by state (collected dynamically)
//! - Orchestrator and surge status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fabrica_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fabrica_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "fabrica_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fabrica_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Job Metrics (collected dynamically)
// =============================================================================

/// Jobs by current state.
pub static JOBS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("fabrica_jobs_by_state", "Current job count by state"),
        &["state"],
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics (collected dynamically)
// =============================================================================

/// Orchestrator running state (1 = running, 0 = stopped).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "fabrica_orchestrator_running",
        "Whether the orchestrator is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Free worker slots.
pub static WORKERS_AVAILABLE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "fabrica_workers_available",
        "Worker pool slots currently free",
    )
    .unwrap()
});

// =============================================================================
// Surge Metrics (collected dynamically)
// =============================================================================

/// Surge pricing active (1) or not (0).
pub static SURGE_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("fabrica_surge_active", "Whether surge pricing is active").unwrap()
});

/// Current surge multiplier.
pub static SURGE_MULTIPLIER: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new("fabrica_surge_multiplier", "Current surge price multiplier").unwrap()
});

/// Last sampled CPU percentage.
pub static SAMPLED_CPU: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new("fabrica_sampled_cpu_pct", "Last sampled CPU percentage").unwrap()
});

/// Last sampled memory percentage.
pub static SAMPLED_MEMORY: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new(
        "fabrica_sampled_memory_pct",
        "Last sampled memory percentage",
    )
    .unwrap()
});

/// Last sampled active-user count.
pub static SAMPLED_ACTIVE_USERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "fabrica_sampled_active_users",
        "Last sampled active-user count",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // Jobs
    registry.register(Box::new(JOBS_BY_STATE.clone())).unwrap();

    // Orchestrator
    registry
        .register(Box::new(ORCHESTRATOR_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(WORKERS_AVAILABLE.clone()))
        .unwrap();

    // Surge
    registry.register(Box::new(SURGE_ACTIVE.clone())).unwrap();
    registry
        .register(Box::new(SURGE_MULTIPLIER.clone()))
        .unwrap();
    registry.register(Box::new(SAMPLED_CPU.clone())).unwrap();
    registry.register(Box::new(SAMPLED_MEMORY.clone())).unwrap();
    registry
        .register(Box::new(SAMPLED_ACTIVE_USERS.clone()))
        .unwrap();

    // Core metrics (admission, pricing, orchestrator, backend)
    for metric in fabrica_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the live orchestrator, surge
/// state, and job counts.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.orchestrator().status();
    ORCHESTRATOR_RUNNING.set(if status.running { 1 } else { 0 });
    WORKERS_AVAILABLE.set(status.available_workers as i64);

    let surge = state.pricing().surge_state();
    SURGE_ACTIVE.set(if surge.surge_active { 1 } else { 0 });
    SURGE_MULTIPLIER.set(surge.multiplier);
    SAMPLED_CPU.set(surge.sampled_cpu as f64);
    SAMPLED_MEMORY.set(surge.sampled_memory as f64);
    SAMPLED_ACTIVE_USERS.set(surge.sampled_active_users as i64);

    let job_store = state.job_store();
    for state_type in ["queued", "processing", "completed", "failed"] {
        let filter = fabrica_core::JobFilter::new().with_state(state_type);
        if let Ok(count) = job_store.count(&filter) {
            JOBS_BY_STATE.with_label_values(&[state_type]).set(count);
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}
