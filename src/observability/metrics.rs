//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): relayed requests by method, status
//! - `proxy_request_duration_seconds` (histogram): client-side latency
//! - `proxy_dispatch_total` (counter): dispatch decisions by outcome
//! - `proxy_transformations_total` (counter): transformer calls by outcome
//! - `proxy_transformation_duration_seconds` (histogram): transformer latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is optional and serves its own HTTP endpoint

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    ::metrics::counter!("proxy_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds", "method" => method, "status" => status)
        .record(start.elapsed().as_secs_f64());
}

/// `outcome` is `invoke` or a skip reason label.
pub fn record_dispatch(outcome: &'static str) {
    ::metrics::counter!("proxy_dispatch_total", "outcome" => outcome).increment(1);
}

/// `start` is `None` for requests dropped before any call was made.
pub fn record_transformation(outcome: &'static str, start: Option<Instant>) {
    ::metrics::counter!("proxy_transformations_total", "outcome" => outcome).increment(1);
    if let Some(start) = start {
        ::metrics::histogram!("proxy_transformation_duration_seconds", "outcome" => outcome)
            .record(start.elapsed().as_secs_f64());
    }
}
