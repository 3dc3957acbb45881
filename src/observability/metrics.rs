//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): dispatches by method, status, outcome
//! - `router_dispatch_duration_seconds` (histogram): dispatch latency
//! - `router_cache_events_total` (counter): route cache hit/miss/rejected/compiled
//! - `router_middleware_halts_total` (counter): requests stopped by middleware
//! - `router_reloads_total` (counter): hot reloads by result
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests free of setup
//! - Labels are static strings or status codes; never paths or params

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(method: &str, status: u16, outcome: &'static str, start: Instant) {
    counter!(
        "router_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("router_dispatch_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_event(event: &'static str) {
    counter!("router_cache_events_total", "event" => event).increment(1);
}

pub fn record_middleware_halt() {
    counter!("router_middleware_halts_total").increment(1);
}

pub fn record_reload(result: &'static str) {
    counter!("router_reloads_total", "result" => result).increment(1);
}
