//! Double-submit CSRF protection.
//!
//! State-changing requests must echo the `csrf_token` cookie in the
//! `X-CSRF-Token` header. Same-origin script can read the cookie and copy it;
//! a cross-origin page cannot. No server-side state is kept.

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::http::response::Rejection;
use crate::observability::metrics;
use crate::security::routes;
use crate::session::cookies::{read_cookie, CSRF_TOKEN_COOKIE};

pub const CSRF_HEADER: &str = "x-csrf-token";

/// Generate a fresh token: 32 bytes from the OS CSPRNG, base64url encoded.
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether `method` on `path` needs a matching header and cookie.
pub fn requires_check(method: &Method, path: &str) -> bool {
    let safe = matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);
    !safe && !routes::is_csrf_exempt(path)
}

/// Compare the header token with the cookie token.
pub fn verify(headers: &HeaderMap) -> Result<(), Rejection> {
    let header = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(Rejection::CsrfMissing)?;

    let cookie = read_cookie(headers, CSRF_TOKEN_COOKIE).ok_or(Rejection::CsrfMismatch)?;

    if header != cookie {
        return Err(Rejection::CsrfMismatch);
    }
    Ok(())
}

/// Pipeline stage: reject unsafe requests whose CSRF tokens are absent or differ.
pub async fn csrf_middleware(request: Request<Body>, next: Next) -> Response {
    if !requires_check(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    match verify(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(rejection) => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                reason = rejection.reason(),
                "CSRF check failed"
            );
            metrics::record_rejection("csrf", rejection.reason());
            rejection.into_response()
        }
    }
}
