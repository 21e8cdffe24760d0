//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_policy_rejections_total` (counter): policy guard rejections by reason
//! - `gateway_upstream_errors_total` (counter): failed upstream exchanges by upstream
//! - `gateway_rate_limit_clients` (gauge): tracked rate-limit entries
//! - `gateway_rate_limit_evictions_total` (counter): evicted rate-limit entries
//!
//! Recording is a no-op until `init_metrics` installs the Prometheus recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("gateway_requests_total", "route" => route, "status" => status).increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_policy_rejection(reason: &'static str) {
    counter!("gateway_policy_rejections_total", "reason" => reason).increment(1);
}

pub fn record_upstream_error(upstream: &'static str) {
    counter!("gateway_upstream_errors_total", "upstream" => upstream).increment(1);
}

pub fn record_rate_limit_clients(count: usize) {
    gauge!("gateway_rate_limit_clients").set(count as f64);
}

pub fn record_rate_limit_evictions(count: usize) {
    counter!("gateway_rate_limit_evictions_total").increment(count as u64);
}
