//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pipeline_executions_total` (counter): executions by outcome
//!   (`completed`, `finished`, `failed`, `cancelled`)
//! - `pipeline_execution_duration_seconds` (histogram): execution latency
//! - `http_calls_total` (counter): calls served by the engine, by status

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished pipeline execution.
pub fn record_execution(outcome: &'static str, start_time: Instant) {
    counter!("pipeline_executions_total", "outcome" => outcome).increment(1);
    histogram!("pipeline_execution_duration_seconds", "outcome" => outcome)
        .record(start_time.elapsed().as_secs_f64());
}

/// Record one HTTP call answered by the engine.
pub fn record_call(method: &str, status: u16) {
    counter!(
        "http_calls_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
