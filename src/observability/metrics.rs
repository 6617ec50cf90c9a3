//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define controller metrics (operations, latency, managed resources)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `route_reconcile_total` (counter): operations by name and result
//! - `route_reconcile_duration_seconds` (histogram): operation latency
//! - `route_managed_resources` (gauge): resources tracked by the runner
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Labels limited to operation and result to keep cardinality fixed

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one controller operation (`observe`, `create`, `update`, `delete`).
pub fn record_operation(operation: &'static str, success: bool, started: Instant) {
    let result = if success { "success" } else { "error" };
    metrics::counter!("route_reconcile_total", "operation" => operation, "result" => result)
        .increment(1);
    metrics::histogram!("route_reconcile_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_managed_resources(count: usize) {
    metrics::gauge!("route_managed_resources").set(count as f64);
}
