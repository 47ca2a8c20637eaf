//! Metrics collection and exposition.
//!
//! # Metrics
//! - `companion_requests_total` (counter): requests by method, status
//! - `companion_request_duration_seconds` (histogram): latency distribution
//! - `companion_auth_rejections_total` (counter): failed secret checks by surface
//! - `companion_module_outcomes_total` (counter): module startup results by kind
//! - `companion_bind_attempts_total` (counter): listener bind attempts by result
//! - `companion_realtime_clients` (gauge): connected socket clients
//!
//! # Design Decisions
//! - The exporter is opt-in; without it the macros hit a no-op recorder

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "companion_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("companion_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// `surface` is `http` or `socket`.
pub fn record_auth_rejection(surface: &'static str) {
    metrics::counter!("companion_auth_rejections_total", "surface" => surface).increment(1);
}

pub fn record_module_outcome(kind: &'static str) {
    metrics::counter!("companion_module_outcomes_total", "kind" => kind).increment(1);
}

pub fn record_bind_attempt(success: bool) {
    let result = if success { "ok" } else { "error" };
    metrics::counter!("companion_bind_attempts_total", "result" => result).increment(1);
}

pub fn realtime_client_connected() {
    metrics::gauge!("companion_realtime_clients").increment(1.0);
}

pub fn realtime_client_disconnected() {
    metrics::gauge!("companion_realtime_clients").decrement(1.0);
}
