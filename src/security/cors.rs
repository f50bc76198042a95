//! Cross-origin response headers.
//!
//! Allowed origins are echoed back with credentials enabled; `*` in the
//! allow-list matches any origin but is never sent literally. Requests from
//! other origins get no CORS headers and are left for the browser to block.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
            ORIGIN, VARY,
        },
        HeaderMap, HeaderValue, Method, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    enabled: bool,
    allowed_origins: Vec<String>,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    max_age: HeaderValue,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        Self {
            enabled: config.enabled,
            allowed_origins: config.allowed_origins.clone(),
            allow_methods: joined(&config.allowed_methods),
            allow_headers: joined(&config.allowed_headers),
            max_age: HeaderValue::from(config.max_age_secs),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
    }

    fn apply_origin(&self, headers: &mut HeaderMap, origin: HeaderValue) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(VARY, HeaderValue::from_static("Origin"));
    }

    fn preflight(&self, origin: HeaderValue) -> Response {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        self.apply_origin(headers, origin);
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        response
    }
}

fn joined(values: &[String]) -> HeaderValue {
    HeaderValue::from_str(&values.join(", ")).unwrap_or_else(|e| {
        tracing::warn!(values = ?values, error = %e, "Ignoring unencodable CORS list");
        HeaderValue::from_static("")
    })
}

/// Pipeline stage: answer preflights and decorate responses for allowed origins.
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !policy.is_enabled() {
        return next.run(request).await;
    }

    let origin = request
        .headers()
        .get(ORIGIN)
        .filter(|v| v.to_str().map(|o| policy.allows(o)).unwrap_or(false))
        .cloned();

    let Some(origin) = origin else {
        return next.run(request).await;
    };

    if request.method() == Method::OPTIONS {
        return policy.preflight(origin);
    }

    let mut response = next.run(request).await;
    policy.apply_origin(response.headers_mut(), origin);
    response
}
