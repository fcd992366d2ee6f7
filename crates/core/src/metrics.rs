//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Validation (rejections by reason)
//! - Submission and polling (remote calls by result)
//! - Orchestration (terminal outcomes, batch durations)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Validation
// =============================================================================

/// Files rejected before queueing, by kind and reason.
pub static VALIDATION_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "transmute_validation_rejections_total",
            "Total files rejected by validation",
        ),
        &["kind", "reason"], // "no_extension", "unsupported_extension", "too_large"
    )
    .unwrap()
});

// =============================================================================
// Remote service
// =============================================================================

/// Submissions by kind and result.
pub static SUBMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmute_submissions_total", "Total job submissions"),
        &["kind", "result"], // "ok", "invalid_params", "rejected", "transport", "malformed_response"
    )
    .unwrap()
});

/// Status polls by kind and result.
pub static POLLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("transmute_polls_total", "Total job status polls"),
        &["kind", "result"], // "ok" or a transport error code
    )
    .unwrap()
});

// =============================================================================
// Orchestration
// =============================================================================

/// Files reaching a terminal state, by kind and outcome.
pub static FILES_TERMINAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "transmute_files_terminal_total",
            "Total files that reached a terminal state",
        ),
        &["kind", "outcome"], // "completed", "submit", "job_failed", "timed_out", "lost_connection", "internal"
    )
    .unwrap()
});

/// Batch run duration in seconds.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "transmute_batch_duration_seconds",
            "Duration of batch runs",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 180.0, 600.0, 1800.0]),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(VALIDATION_REJECTIONS.clone()),
        Box::new(SUBMISSIONS_TOTAL.clone()),
        Box::new(POLLS_TOTAL.clone()),
        Box::new(FILES_TERMINAL.clone()),
        Box::new(BATCH_DURATION.clone()),
    ]
}
