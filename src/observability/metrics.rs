//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define ingress metrics (requests, latency, IP failures, reloads)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `ingress_requests_total` (counter): dispatched requests by entry point
//! - `ingress_request_duration_seconds` (histogram): handling latency by entry point and status
//! - `ingress_ip_resolution_failures_total` (counter): requests rejected for bad client IP data
//! - `ingress_config_reloads_total` (counter): reload attempts by outcome
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op, so tests and the
//!   CLI need no setup
//! - Labels kept to low-cardinality values

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a handled request.
pub fn record_request(entry_point: &str, status: u16, start: Instant) {
    metrics::histogram!(
        "ingress_request_duration_seconds",
        "entry_point" => entry_point.to_string(),
        "status" => status.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a request rejected because its client IP could not be resolved.
pub fn record_ip_resolution_failure(reason: &'static str) {
    metrics::counter!("ingress_ip_resolution_failures_total", "reason" => reason).increment(1);
}

/// Record a configuration reload attempt.
pub fn record_config_reload(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("ingress_config_reloads_total", "outcome" => outcome).increment(1);
}
