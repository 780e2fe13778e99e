//! Prometheus metrics for the analysis pipeline.
//!
//! This module provides metrics for:
//! - Listings normalized and dropped
//! - Match candidates and margin rejections
//! - Provider failures and fetch latency
//! - Pipeline runs and latency
//! - HTTP request latency

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

use crate::listing::Marketplace;

// === Metric Name Constants ===

/// Pipeline latency metric name.
pub const METRIC_PIPELINE_LATENCY: &str = "pipeline_latency_ms";
/// Provider fetch latency metric name.
pub const METRIC_PROVIDER_FETCH_LATENCY: &str = "provider_fetch_latency_ms";
/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";
/// Listings normalized counter metric name.
pub const METRIC_LISTINGS_NORMALIZED: &str = "listings_normalized_total";
/// Listings dropped counter metric name.
pub const METRIC_LISTINGS_DROPPED: &str = "listings_dropped_total";
/// Match candidates counter metric name.
pub const METRIC_MATCH_CANDIDATES: &str = "match_candidates_total";
/// Margin rejections counter metric name.
pub const METRIC_MARGIN_REJECTIONS: &str = "margin_rejections_total";
/// Provider failures counter metric name.
pub const METRIC_PROVIDER_FAILURES: &str = "provider_failures_total";
/// Pipeline runs counter metric name.
pub const METRIC_PIPELINE_RUNS: &str = "pipeline_runs_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    // Latency histograms
    describe_histogram!(
        METRIC_PIPELINE_LATENCY,
        "Time to match, price and summarize one snapshot in milliseconds"
    );
    describe_histogram!(
        METRIC_PROVIDER_FETCH_LATENCY,
        "Listing provider fetch latency in milliseconds"
    );
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );

    // Counters
    describe_counter!(
        METRIC_LISTINGS_NORMALIZED,
        "Total number of raw listings normalized"
    );
    describe_counter!(
        METRIC_LISTINGS_DROPPED,
        "Total number of raw listings dropped during normalization"
    );
    describe_counter!(
        METRIC_MATCH_CANDIDATES,
        "Total number of match candidates produced"
    );
    describe_counter!(
        METRIC_MARGIN_REJECTIONS,
        "Total number of candidates rejected by the margin step"
    );
    describe_counter!(
        METRIC_PROVIDER_FAILURES,
        "Total number of provider calls treated as empty"
    );
    describe_counter!(METRIC_PIPELINE_RUNS, "Total number of pipeline runs");

    debug!("Metrics initialized");
}

/// Record provider fetch latency.
pub fn record_provider_fetch_latency(start: Instant, provider: &'static str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_PROVIDER_FETCH_LATENCY, "provider" => provider).record(latency_ms);
}

/// Record HTTP request latency.
pub fn record_http_latency(start: Instant, endpoint: &'static str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "endpoint" => endpoint).record(latency_ms);
}

/// Add to the normalized listings counter.
pub fn inc_listings_normalized(marketplace: Marketplace, count: u64) {
    counter!(METRIC_LISTINGS_NORMALIZED, "marketplace" => marketplace.to_string()).increment(count);
}

/// Increment the dropped listings counter.
pub fn inc_listings_dropped(marketplace: Marketplace, reason: &'static str) {
    counter!(
        METRIC_LISTINGS_DROPPED,
        "marketplace" => marketplace.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Add to the match candidates counter.
pub fn inc_match_candidates(count: u64) {
    counter!(METRIC_MATCH_CANDIDATES).increment(count);
}

/// Increment the margin rejections counter.
pub fn inc_margin_rejections(reason: &'static str) {
    counter!(METRIC_MARGIN_REJECTIONS, "reason" => reason).increment(1);
}

/// Increment the provider failures counter.
pub fn inc_provider_failures(provider: &'static str) {
    counter!(METRIC_PROVIDER_FAILURES, "provider" => provider).increment(1);
}

/// Increment the pipeline runs counter.
pub fn inc_pipeline_runs() {
    counter!(METRIC_PIPELINE_RUNS).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for one pipeline run.
pub fn timer_pipeline() -> LatencyTimer {
    LatencyTimer::new(METRIC_PIPELINE_LATENCY)
}
