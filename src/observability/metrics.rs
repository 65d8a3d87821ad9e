//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_client_latency_ms` (histogram): per-attempt latency by tool,
//!   method and status class
//! - `http_client_retries_total` (counter): retries executed by tool, reason
//! - `tool_client_errors_total` (counter): canonical errors by tool, code
//! - `http_client_circuit_open` (gauge): breaker state per tool (1=open)
//!
//! # Design Decisions
//! - Emission goes through the `metrics` facade; the recorder is whatever
//!   the host process installed
//! - `init_metrics` offers the Prometheus exporter for processes that do
//!   not bring their own recorder

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub const LATENCY_HISTOGRAM: &str = "http_client_latency_ms";
pub const RETRY_COUNTER: &str = "http_client_retries_total";
pub const ERROR_COUNTER: &str = "tool_client_errors_total";
pub const BREAKER_GAUGE: &str = "http_client_circuit_open";

/// Install the Prometheus exporter on `addr` and describe the instruments.
///
/// Must be called from within a Tokio runtime. Failure to bind is logged,
/// not fatal; the client keeps working against the no-op recorder.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(error) => {
            tracing::error!(error = %error, "Failed to install metrics exporter");
        }
    }
}

/// Register descriptions and units for every instrument this crate emits.
pub fn describe_metrics() {
    describe_histogram!(
        LATENCY_HISTOGRAM,
        Unit::Milliseconds,
        "Latency of HTTP requests from tool adapters"
    );
    describe_counter!(RETRY_COUNTER, "Number of HTTP retries executed");
    describe_counter!(ERROR_COUNTER, "Canonical tool errors emitted by adapters");
    describe_gauge!(BREAKER_GAUGE, "State of the HTTP circuit breaker (1=open)");
}

/// Record one attempt's latency.
pub fn record_latency(tool: &str, method: &str, status_class: &'static str, elapsed_ms: f64) {
    histogram!(
        LATENCY_HISTOGRAM,
        "tool" => tool.to_owned(),
        "method" => method.to_owned(),
        "status_class" => status_class
    )
    .record(elapsed_ms);
}

/// Count one retry for `tool` with its classified reason.
pub fn record_retry(tool: &str, reason: &'static str) {
    counter!(
        RETRY_COUNTER,
        "tool" => tool.to_owned(),
        "reason" => reason
    )
    .increment(1);
}

/// Count one canonical error surfaced to a caller.
pub fn record_error(tool: &str, code: &'static str) {
    counter!(
        ERROR_COUNTER,
        "tool" => tool.to_owned(),
        "code" => code
    )
    .increment(1);
}

/// Publish the breaker state for `tool`.
pub fn record_breaker_state(tool: &str, open: bool) {
    gauge!(BREAKER_GAUGE, "tool" => tool.to_owned()).set(if open { 1.0 } else { 0.0 });
}
