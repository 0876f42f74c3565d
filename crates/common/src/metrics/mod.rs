//! Metrics and observability utilities
//!
//! Prometheus metrics through the `metrics` facade, with a shared prefix
//! and histogram buckets sized for upstream calls.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all PaperLedger metrics
pub const METRICS_PREFIX: &str = "paperledger";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for LLM and ledger round trips (typically slower)
pub const UPSTREAM_BUCKETS: &[f64] = &[
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.000, // 2s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
];

/// Histograms that use [`UPSTREAM_BUCKETS`] instead of [`LATENCY_BUCKETS`]
pub fn upstream_histograms() -> [String; 2] {
    [
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        format!("{}_ledger_duration_seconds", METRICS_PREFIX),
    ]
}

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Catalogue metrics
    describe_counter!(
        format!("{}_papers_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total papers created"
    );

    describe_counter!(
        format!("{}_blob_bytes_written_total", METRICS_PREFIX),
        Unit::Bytes,
        "Total bytes written to blob storage"
    );

    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search query latency in seconds"
    );

    describe_gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of results returned from search"
    );

    // Upstream metrics
    describe_counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total LLM completion requests"
    );

    describe_histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "LLM completion latency in seconds"
    );

    describe_counter!(
        format!("{}_ledger_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Total ledger round trips"
    );

    describe_histogram!(
        format!("{}_ledger_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Ledger round trip latency in seconds"
    );

    // Billing metrics
    describe_counter!(
        format!("{}_payments_total", METRICS_PREFIX),
        Unit::Count,
        "Total payment settlements attempted"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a created paper; `source` is `json` or `upload`
pub fn record_paper_created(source: &str, blob_bytes: u64) {
    counter!(
        format!("{}_papers_created_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(1);

    if blob_bytes > 0 {
        counter!(format!("{}_blob_bytes_written_total", METRICS_PREFIX)).increment(blob_bytes);
    }
}

/// Helper to record search metrics
pub fn record_search(duration_secs: f64, mode: &str, result_count: usize) {
    counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .set(result_count as f64);
}

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Helper to record LLM metrics
pub fn record_llm(duration_secs: f64, model: &str, success: bool) {
    counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status_label(success)
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_llm_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}

/// Helper to record ledger metrics
pub fn record_ledger(duration_secs: f64, operation: &str, success: bool) {
    counter!(
        format!("{}_ledger_calls_total", METRICS_PREFIX),
        "operation" => operation.to_string(),
        "status" => status_label(success)
    )
    .increment(1);

    histogram!(
        format!("{}_ledger_duration_seconds", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

/// Helper to record payment metrics
pub fn record_payment(mode: &str, success: bool) {
    counter!(
        format!("{}_payments_total", METRICS_PREFIX),
        "mode" => mode.to_string(),
        "status" => status_label(success)
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, UPSTREAM_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_helpers_without_recorder() {
        let metrics = RequestMetrics::start("GET", "/api/papers");
        metrics.finish(200);
        record_paper_created("upload", 1024);
        record_ledger(0.2, "create_topic", true);
        record_payment("simulated", true);
        // No recorder installed; the facade drops everything
    }
}
