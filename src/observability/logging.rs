//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Log every request once it has a response (outermost pipeline stage)
//! - Redact credential-bearing headers in production
//!
//! # Design Decisions
//! - JSON lines in production, human-readable lines in development
//! - `RUST_LOG` wins over config; config wins over the environment default
//! - Request bodies are never logged

use std::collections::BTreeMap;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Environment, ObservabilityConfig};
use crate::http::request::{client_ip_of, request_id};
use crate::observability::metrics;

/// Headers replaced with `[REDACTED]` in production request logs.
const REDACTED_HEADERS: [&str; 3] = ["cookie", "authorization", "x-csrf-token"];

/// Filter directive used when neither `RUST_LOG` nor config sets one.
pub fn default_directive(environment: Environment) -> &'static str {
    if environment.is_production() {
        "info"
    } else {
        "debug"
    }
}

/// Install the global subscriber.
pub fn init_logging(
    environment: Environment,
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let directive = config
        .log_level
        .as_deref()
        .unwrap_or_else(|| default_directive(environment));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let json = environment
        .is_production()
        .then(|| fmt::layer().json().with_current_span(true));
    let pretty = (!environment.is_production()).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()
}

/// Header map flattened for logging, first value per name.
pub fn sanitize_headers(headers: &HeaderMap, environment: Environment) -> BTreeMap<String, String> {
    let mut sanitized = BTreeMap::new();
    for name in headers.keys() {
        let value = if environment.is_production() && REDACTED_HEADERS.contains(&name.as_str()) {
            "[REDACTED]".to_string()
        } else {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<binary>")
                .to_string()
        };
        sanitized.insert(name.as_str().to_string(), value);
    }
    sanitized
}

/// Pipeline stage: time the request, then log and count it.
pub async fn log_requests(
    State(environment): State<Environment>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);
    let client_ip = client_ip_of(&request);
    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let headers = sanitize_headers(request.headers(), environment);

    let span = tracing::info_span!(
        "request",
        request_id = request_id(request.headers()).unwrap_or("-"),
        method = %method,
        path = %path,
        client_ip = client_ip.as_deref().unwrap_or("-"),
    );

    let response = next.run(request).instrument(span.clone()).await;
    let status = response.status().as_u16();

    metrics::record_request(method.as_str(), status, started);

    span.in_scope(|| {
        tracing::debug!(
            query = ?query,
            status,
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            user_agent = ?user_agent,
            headers = ?headers,
            "Incoming request"
        );
    });

    response
}
