//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, upstream calls, fallbacks, breakers)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-service and per-instance metrics
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound requests by route, status
//! - `gateway_request_duration_seconds` (histogram): inbound latency
//! - `gateway_upstream_calls_total` (counter): upstream calls by service, outcome
//! - `gateway_upstream_call_duration_seconds` (histogram): upstream latency
//! - `gateway_fallbacks_total` (counter): fallbacks by breaker, reason
//! - `gateway_breaker_transitions_total` (counter): breaker state changes
//! - `gateway_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `gateway_instance_health` (gauge): 1=healthy, 0=unhealthy
//! - `gateway_registry_instances` (gauge): known instances per service
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs a recorder
//! - Labels are low-cardinality: no user keys

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::Instant;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    let status = status.to_string();
    ::metrics::counter!("gateway_requests_total", "route" => route, "status" => status)
        .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_call(service: &str, outcome: &'static str, start: Instant) {
    let service = service.to_string();
    ::metrics::counter!(
        "gateway_upstream_calls_total",
        "service" => service.clone(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!("gateway_upstream_call_duration_seconds", "service" => service)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_fallback(breaker: &str, reason: &'static str) {
    ::metrics::counter!(
        "gateway_fallbacks_total",
        "breaker" => breaker.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_breaker_transition(breaker: &str, from: CircuitState, to: CircuitState) {
    ::metrics::counter!(
        "gateway_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
    record_breaker_state(breaker, to);
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    };
    ::metrics::gauge!("gateway_breaker_state", "breaker" => breaker.to_string()).set(value);
}

pub fn record_instance_health(instance: &str, healthy: bool) {
    ::metrics::gauge!("gateway_instance_health", "instance" => instance.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_registry_size(service: &str, count: usize) {
    ::metrics::gauge!("gateway_registry_instances", "service" => service.to_string())
        .set(count as f64);
}
