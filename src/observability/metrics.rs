//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hwl_connections_total` (counter): accepted connections by leg
//! - `hwl_requests_total` (counter): requests forwarded by leg
//! - `hwl_rejections_total` (counter): 400 responses by leg and reason
//! - `hwl_connection_errors_total` (counter): connections torn down by an error, by leg and kind
//! - `hwl_active_sessions` (gauge): withheld fragments awaiting the outgoing leg
//!
//! Without an installed recorder every call is a no-op, so the proxy core
//! never needs to know whether the exporter is running.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_connection(leg: &'static str) {
    metrics::counter!("hwl_connections_total", "leg" => leg).increment(1);
}

pub fn record_request(leg: &'static str) {
    metrics::counter!("hwl_requests_total", "leg" => leg).increment(1);
}

pub fn record_rejection(leg: &'static str, reason: &'static str) {
    metrics::counter!("hwl_rejections_total", "leg" => leg, "reason" => reason).increment(1);
}

pub fn record_connection_error(leg: &'static str, kind: &'static str) {
    metrics::counter!("hwl_connection_errors_total", "leg" => leg, "kind" => kind).increment(1);
}

pub fn record_active_sessions(count: usize) {
    metrics::gauge!("hwl_active_sessions").set(count as f64);
}
