//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): completed requests by method, status
//! - `http_request_duration_seconds` (histogram): latency by method
//! - `http_requests_in_flight` (gauge): requests currently being served
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in and started from `main`

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, duration: Duration) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("http_request_duration_seconds", "method" => method.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_in_flight(count: usize) {
    metrics::gauge!("http_requests_in_flight").set(count as f64);
}
