//! Metrics collection and exposition.
//!
//! # Metrics
//! - `imm_notifications_total` (counter): dispatched notifications by machine, signal
//! - `imm_notifications_suppressed_total` (counter): notifications dropped while suspended
//! - `imm_handler_failures_total` (counter): failed or panicked handlers
//! - `imm_connect_attempts_total` (counter): connect attempts by outcome
//! - `imm_connection_state` (gauge): 0=disconnected, 1=connecting, 2=connected
//! - `imm_cycles_total` / `imm_rollovers_total` (counter): derived records
//! - `imm_sink_failures_total` (counter): bus or log failures
//!
//! Without an installed recorder every call is a no-op, which is what tests rely on.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_notification(machine: &str, signal: &str) {
    counter!(
        "imm_notifications_total",
        "machine" => machine.to_string(),
        "signal" => signal.to_string()
    )
    .increment(1);
}

pub fn record_suppressed(machine: &str, signal: &str) {
    counter!(
        "imm_notifications_suppressed_total",
        "machine" => machine.to_string(),
        "signal" => signal.to_string()
    )
    .increment(1);
}

pub fn record_handler_failure(machine: &str, signal: &str, handler: &str) {
    counter!(
        "imm_handler_failures_total",
        "machine" => machine.to_string(),
        "signal" => signal.to_string(),
        "handler" => handler.to_string()
    )
    .increment(1);
}

pub fn record_connect_attempt(machine: &str, outcome: &'static str) {
    counter!(
        "imm_connect_attempts_total",
        "machine" => machine.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_connection_state(machine: &str, state: f64) {
    gauge!("imm_connection_state", "machine" => machine.to_string()).set(state);
}

pub fn record_cycle(machine: &str) {
    counter!("imm_cycles_total", "machine" => machine.to_string()).increment(1);
}

pub fn record_rollover(machine: &str) {
    counter!("imm_rollovers_total", "machine" => machine.to_string()).increment(1);
}

pub fn record_sink_failure(sink: &'static str) {
    counter!("imm_sink_failures_total", "sink" => sink).increment(1);
}
