//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rpc_client_requests_total` (counter): calls by target, method, peer, code, breaker_open
//! - `rpc_client_request_duration_seconds` (histogram): call latency, including fast-fail
//! - `rpc_breaker_open` (gauge): 1=open, 0=closed
//! - `rpc_connection_available` (gauge): 1=selectable, 0=fused
//! - `rpc_probe_attempts_total` (counter): health probes by peer, result
//! - `rpc_picker_connections` (gauge): size of the current connection set
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::Code;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(target: &str, method: &str, peer: Option<SocketAddr>, code: Code, breaker_open: bool, start: Instant) {
    let peer = peer.map(|p| p.to_string()).unwrap_or_else(|| "none".to_string());
    counter!(
        "rpc_client_requests_total",
        "target" => target.to_string(),
        "method" => method.to_string(),
        "peer" => peer,
        "code" => code.as_str(),
        "breaker_open" => if breaker_open { "true" } else { "false" }
    )
    .increment(1);
    histogram!(
        "rpc_client_request_duration_seconds",
        "target" => target.to_string(),
        "method" => method.to_string(),
        "code" => code.as_str()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_breaker_state(breaker: &str, open: bool) {
    gauge!("rpc_breaker_open", "breaker" => breaker.to_string()).set(if open { 1.0 } else { 0.0 });
}

pub fn record_connection_available(peer: &str, available: bool) {
    gauge!("rpc_connection_available", "peer" => peer.to_string()).set(if available { 1.0 } else { 0.0 });
}

pub fn record_probe(peer: &str, success: bool) {
    counter!(
        "rpc_probe_attempts_total",
        "peer" => peer.to_string(),
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

pub fn record_picker_size(target: &str, connections: usize) {
    gauge!("rpc_picker_connections", "target" => target.to_string()).set(connections as f64);
}
