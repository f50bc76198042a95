//! Request pipeline composition.
//!
//! # Stage order (outer to inner)
//! ```text
//! request id → logging → timeout → rate limit → CORS → CSRF → authentication → handler
//! ```
//!
//! # Design Decisions
//! - One builder, one fixed order; stages are plain functions over
//!   (request, next) and know nothing about each other
//! - The request ID is assigned before logging so every line carries it
//! - The timeout sits inside logging so timed-out requests are still logged

use std::time::Duration;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use crate::http::request::X_REQUEST_ID;
use crate::http::server::AppState;
use crate::observability::logging::log_requests;
use crate::security::access_control::{access_control_middleware, AccessControlState};
use crate::security::cors::cors_middleware;
use crate::security::csrf::csrf_middleware;
use crate::security::rate_limit::rate_limit_middleware;

/// Wrap `routes` in the admission pipeline.
#[allow(deprecated)]
pub fn build_pipeline(routes: Router, state: &AppState) -> Router {
    let auth = AccessControlState {
        tokens: state.tokens.clone(),
        cookies: state.cookies,
    };
    let request_timeout = Duration::from_secs(state.config.app.request_timeout_secs);

    routes.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(from_fn_with_state(
                state.config.app.environment,
                log_requests,
            ))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(from_fn_with_state(
                state.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(from_fn_with_state(state.cors.clone(), cors_middleware))
            .layer(from_fn(csrf_middleware))
            .layer(from_fn_with_state(auth, access_control_middleware)),
    )
}
