//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_rejections_total` (counter): terminal decisions by stage, reason
//! - `gateway_rate_store_failures_total` (counter): fail-open admissions by
//!   store operation
//! - `gateway_sessions_issued_total` (counter): sessions minted by login,
//!   explicit refresh, verify or the authentication stage
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Labels are static strings except method and status

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

const REQUESTS_TOTAL: &str = "gateway_requests_total";
const REQUEST_DURATION: &str = "gateway_request_duration_seconds";
const REJECTIONS_TOTAL: &str = "gateway_rejections_total";
const STORE_FAILURES_TOTAL: &str = "gateway_rate_store_failures_total";
const SESSIONS_ISSUED_TOTAL: &str = "gateway_sessions_issued_total";

/// Latency buckets in seconds.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), DURATION_BUCKETS)?
        .install()?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, started: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION).record(started.elapsed().as_secs_f64());
}

pub fn record_rejection(stage: &'static str, reason: &'static str) {
    metrics::counter!(REJECTIONS_TOTAL, "stage" => stage, "reason" => reason).increment(1);
}

pub fn record_store_failure(operation: &'static str) {
    metrics::counter!(STORE_FAILURES_TOTAL, "operation" => operation).increment(1);
}

pub fn record_session_issued(via: &'static str) {
    metrics::counter!(SESSIONS_ISSUED_TOTAL, "via" => via).increment(1);
}
