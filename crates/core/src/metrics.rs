//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Rendering (runs, durations, probe failures)
//! - Source downloads and artifact uploads
//! - Composer jobs

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

// =============================================================================
// Render Metrics
// =============================================================================

/// Transcoder runs by result.
pub static RENDERS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelsmith_renders_total", "Total transcoder runs"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Render duration in seconds.
pub static RENDER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelsmith_render_duration_seconds",
            "Duration of a compile-and-run cycle",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["result"],
    )
    .unwrap()
});

/// Streams per compiled graph.
pub static STREAMS_PER_RENDER: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelsmith_streams_per_render",
            "Number of concatenated streams per render",
        )
        .buckets(vec![1.0, 2.0, 3.0, 5.0, 10.0]),
        &[],
    )
    .unwrap()
});

/// Probe calls that failed.
pub static PROBE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("reelsmith_probe_failures_total", "Total failed media probes").unwrap()
});

// =============================================================================
// Transfer Metrics
// =============================================================================

/// Source downloads by result.
pub static DOWNLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelsmith_downloads_total", "Total source downloads"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Bytes fetched from sources.
pub static DOWNLOADED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelsmith_downloaded_bytes_total",
        "Total bytes written by source downloads",
    )
    .unwrap()
});

/// Artifact uploads by result.
pub static UPLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelsmith_uploads_total", "Total artifact uploads"),
        &["result"],
    )
    .unwrap()
});

/// Retry attempts by operation.
pub static RETRY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelsmith_retry_attempts_total", "Total retry attempts"),
        &["operation"], // "download", "render"
    )
    .unwrap()
});

// =============================================================================
// Composer Metrics
// =============================================================================

/// Composer jobs by scenario and result.
pub static COMPOSER_JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelsmith_composer_jobs_total", "Total composer jobs"),
        &["scenario", "result"],
    )
    .unwrap()
});

/// Renders currently holding a slot.
pub static ACTIVE_RENDERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelsmith_active_renders",
        "Renders currently running in the composer",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Render
        Box::new(RENDERS.clone()),
        Box::new(RENDER_DURATION.clone()),
        Box::new(STREAMS_PER_RENDER.clone()),
        Box::new(PROBE_FAILURES.clone()),
        // Transfers
        Box::new(DOWNLOADS.clone()),
        Box::new(DOWNLOADED_BYTES.clone()),
        Box::new(UPLOADS.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
        // Composer
        Box::new(COMPOSER_JOBS.clone()),
        Box::new(ACTIVE_RENDERS.clone()),
    ]
}

/// Registers every core metric in `registry`.
pub fn register_all(registry: &Registry) -> Result<(), prometheus::Error> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}

/// Encodes everything gathered by `registry` in Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
