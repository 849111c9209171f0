//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_fetch_duration_seconds` (histogram): origin fetch latency by status
//! - `proxy_compression_total` (counter): compression jobs by outcome and strategy
//! - `proxy_bytes_saved_total` (counter): bytes saved by transformed responses
//! - `proxy_bypass_total` (counter): payloads forwarded untouched
//!
//! # Design Decisions
//! - The Prometheus exporter runs its own listener, separate from proxy traffic
//! - Negative savings are never subtracted from the counter

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request.
pub fn record_request(status: u16, start: Instant) {
    let status = status.to_string();
    counter!("proxy_requests_total", "status" => status).increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record an origin fetch. Transport failures are recorded under the status they answer with.
pub fn record_fetch(status: u16, start: Instant) {
    let status = status.to_string();
    histogram!("proxy_fetch_duration_seconds", "status" => status)
        .record(start.elapsed().as_secs_f64());
}

/// Record a compression job.
pub fn record_compression(outcome: &'static str, strategy: &'static str, bytes_saved: i64) {
    counter!("proxy_compression_total", "outcome" => outcome, "strategy" => strategy)
        .increment(1);
    if bytes_saved > 0 {
        counter!("proxy_bytes_saved_total").increment(bytes_saved as u64);
    }
}

/// Record a payload forwarded without compression.
pub fn record_bypass() {
    counter!("proxy_bypass_total").increment(1);
}
