//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (requests, latency, guard denials, bundle builds)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `server_requests_total` (counter): requests by method, route, status
//! - `server_request_duration_seconds` (histogram): latency distribution
//! - `server_guard_denials_total` (counter): 403s by route
//! - `server_bundle_builds_total` (counter): bundle builds by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels use the declared route, never the raw path

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Record one completed request.
pub fn record_request(method: &str, route: &str, status: u16, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("server_requests_total", &labels).increment(1);
    metrics::histogram!("server_request_duration_seconds", &labels).record(started.elapsed().as_secs_f64());
}

/// Record a request denied by a guard.
pub fn record_guard_denied(route: &str) {
    metrics::counter!("server_guard_denials_total", "route" => route.to_string()).increment(1);
}

/// Record a bundle build; `outcome` is `success` or `failure`.
pub fn record_bundle_build(outcome: &'static str) {
    metrics::counter!("server_bundle_builds_total", "outcome" => outcome).increment(1);
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}
