//! Metrics and telemetry for insight computation
//!
//! Prometheus metrics covering invocations, searches, skipped samples and
//! aggregator overflow.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};

lazy_static! {
    /// Executor invocations by outcome
    pub static ref INVOCATIONS_TOTAL: CounterVec = register_counter_vec!(
        "insights_invocations_total",
        "Total capture group executor invocations",
        &["status"]
    ).unwrap();

    /// Searches by outcome
    pub static ref SEARCHES_TOTAL: CounterVec = register_counter_vec!(
        "insights_searches_total",
        "Total scoped searches executed",
        &["status"]
    ).unwrap();

    /// Search latency
    pub static ref SEARCH_DURATION: HistogramVec = register_histogram_vec!(
        "insights_search_duration_seconds",
        "Scoped search latency in seconds",
        &["status"],
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0]
    ).unwrap();

    /// Sample points skipped per repository
    pub static ref SKIPPED_SAMPLES_TOTAL: CounterVec = register_counter_vec!(
        "insights_skipped_samples_total",
        "Sample points contributing no data",
        &["reason"]
    ).unwrap();

    /// Increments rejected by a bounded aggregator
    pub static ref AGGREGATOR_OVERFLOW_TOTAL: Counter = register_counter!(
        "insights_aggregator_overflow_total",
        "Total count rejected because an aggregator reached capacity"
    ).unwrap();
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record the outcome of an executor invocation
#[inline]
pub fn record_invocation(success: bool) {
    let status = if success { "success" } else { "error" };
    INVOCATIONS_TOTAL.with_label_values(&[status]).inc();
}

/// Record a finished search
#[inline]
pub fn record_search(duration_secs: f64, status: &str) {
    SEARCHES_TOTAL.with_label_values(&[status]).inc();
    SEARCH_DURATION
        .with_label_values(&[status])
        .observe(duration_secs);
}

/// Record a sample point that contributed nothing
#[inline]
pub fn record_skipped_sample(reason: &str) {
    SKIPPED_SAMPLES_TOTAL.with_label_values(&[reason]).inc();
}

/// Record counts rejected by an aggregator
#[inline]
pub fn record_aggregator_overflow(rejected: u64) {
    AGGREGATOR_OVERFLOW_TOTAL.inc_by(rejected as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_contains_recorded_metrics() {
        record_search(0.2, "success");
        record_skipped_sample("no_history");
        let text = gather_metrics().unwrap();
        assert!(text.contains("insights_searches_total"));
        assert!(text.contains("insights_skipped_samples_total"));
    }
}
