//! Metrics collection and exposition.
//!
//! # Metrics
//! - `healthcheck_requests_total` (counter): endpoint responses by status
//! - `healthcheck_backend_available` (gauge): 1=available, 0=unavailable
//! - `healthcheck_backend_duration_seconds` (histogram): time spent per backend

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_backend_check(backend: &str, available: bool, started: Instant) {
    ::metrics::gauge!("healthcheck_backend_available", "backend" => backend.to_string())
        .set(if available { 1.0 } else { 0.0 });
    ::metrics::histogram!("healthcheck_backend_duration_seconds", "backend" => backend.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_response(status: u16) {
    ::metrics::counter!("healthcheck_requests_total", "status" => status.to_string()).increment(1);
}
