//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Admission control (decisions per zone)
//! - Pricing (surge transitions)
//! - Orchestrator (submissions, transitions, retries, CAS races)
//! - External services (generation backend)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Admission Metrics
// =============================================================================

/// Admission decisions by zone and outcome.
pub static ADMISSION_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fabrica_admission_decisions_total", "Admission decisions"),
        &["zone", "decision"], // "allowed", "rejected", "shadow_exceeded"
    )
    .unwrap()
});

// =============================================================================
// Pricing Metrics
// =============================================================================

/// Surge pricing state transitions.
pub static SURGE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fabrica_surge_transitions_total",
            "Surge pricing activations and deactivations",
        ),
        &["direction"], // "activated", "deactivated"
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Jobs submitted total.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("fabrica_jobs_submitted_total", "Total jobs submitted").unwrap()
});

/// Jobs that reached Completed.
pub static JOBS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "fabrica_jobs_completed_total",
        "Total jobs completed successfully",
    )
    .unwrap()
});

/// Jobs that reached Failed, by reason code.
pub static JOBS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fabrica_jobs_failed_total", "Total jobs failed"),
        &["reason"], // "backend", "timeout", "storage"
    )
    .unwrap()
});

/// Job state transitions.
pub static JOB_STATE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fabrica_job_state_transitions_total",
            "Job state transitions",
        ),
        &["from_state", "to_state"],
    )
    .unwrap()
});

/// Processing duration in seconds.
pub static JOB_PROCESSING_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fabrica_job_processing_duration_seconds",
            "Duration from worker pickup to terminal state",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Backend retry attempts total.
pub static GENERATION_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "fabrica_generation_retries_total",
        "Transient backend failures retried",
    )
    .unwrap()
});

/// Compare-and-set conflicts, by losing writer.
pub static CAS_CONFLICTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fabrica_cas_conflicts_total",
            "State transitions discarded after losing the version race",
        ),
        &["writer"], // "worker", "watchdog"
    )
    .unwrap()
});

/// Jobs forced to Failed by the watchdog.
pub static WATCHDOG_TIMEOUTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "fabrica_watchdog_timeouts_total",
        "Jobs timed out by the watchdog",
    )
    .unwrap()
});

/// Terminal jobs evicted by the retention sweep.
pub static JOBS_EVICTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "fabrica_jobs_evicted_total",
        "Terminal jobs evicted after the retention window",
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// Generation backend request duration.
pub static BACKEND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fabrica_backend_duration_seconds",
            "Duration of generation backend calls",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["status"], // "success", "transient", "rejected"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Admission
        Box::new(ADMISSION_DECISIONS.clone()),
        // Pricing
        Box::new(SURGE_TRANSITIONS.clone()),
        // Orchestrator
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_COMPLETED.clone()),
        Box::new(JOBS_FAILED.clone()),
        Box::new(JOB_STATE_TRANSITIONS.clone()),
        Box::new(JOB_PROCESSING_DURATION.clone()),
        Box::new(GENERATION_RETRIES.clone()),
        Box::new(CAS_CONFLICTS.clone()),
        Box::new(WATCHDOG_TIMEOUTS.clone()),
        Box::new(JOBS_EVICTED.clone()),
        // External services
        Box::new(BACKEND_DURATION.clone()),
    ]
}
