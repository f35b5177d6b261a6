//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_client_requests_total` (counter): calls by method, outcome
//! - `http_client_request_duration_seconds` (histogram): latency distribution
//! - `http_client_failures_total` (counter): failures by kind
//!
//! `outcome` is the status class (`2xx`..`5xx`) or the failure kind, which
//! keeps label cardinality bounded.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::diagnostics::record::OutcomeRecord;
use crate::observability::sink::DiagnosticsSink;

/// Initialize the Prometheus exporter on the given address.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed call.
pub fn record_outcome(outcome: &OutcomeRecord) {
    let method = outcome.method.to_string();
    let label = outcome.outcome().label();

    metrics::counter!(
        "http_client_requests_total",
        "method" => method.clone(),
        "outcome" => label
    )
    .increment(1);

    metrics::histogram!(
        "http_client_request_duration_seconds",
        "method" => method,
        "outcome" => label
    )
    .record(outcome.duration.as_secs_f64());

    if let Some(kind) = outcome.failure {
        metrics::counter!("http_client_failures_total", "kind" => kind.as_str()).increment(1);
    }
}

/// Sink that feeds every outcome into the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSink;

impl DiagnosticsSink for MetricsSink {
    fn record(&self, outcome: &OutcomeRecord) {
        record_outcome(outcome);
    }
}
