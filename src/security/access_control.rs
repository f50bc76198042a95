//! Authentication stage.
//! Requires a session on every non-public API route.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::COOKIE, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::observability::metrics;
use crate::security::routes;
use crate::session::cookies::{prepend_set_cookies, read_cookie, ACCESS_TOKEN_COOKIE};
use crate::session::{resolve_session, SessionCookies, SessionResolution, TokenService};

/// State required for authentication.
#[derive(Clone)]
pub struct AccessControlState {
    pub tokens: Arc<TokenService>,
    pub cookies: SessionCookies,
}

/// Context attached to authenticated requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
    /// The access token in force for this request, newly minted if the
    /// session was refreshed on the way in.
    pub access_token: String,
    pub refreshed: bool,
}

pub async fn access_control_middleware(
    State(state): State<AccessControlState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path();

    // 1. Frontend routes and public API routes pass untouched.
    if !routes::is_api(path) || routes::is_public_api(path) {
        return next.run(req).await;
    }

    // 2. Resolve the session from cookies, falling back to the refresh token.
    let resolution = match resolve_session(&state.tokens, req.headers()) {
        Ok(resolution) => resolution,
        Err(rejection) => {
            tracing::warn!(
                method = %req.method(),
                path = %path,
                reason = rejection.reason(),
                "Authentication failed"
            );
            metrics::record_rejection("auth", rejection.reason());
            return rejection.into_response();
        }
    };

    // 3. Attach context and run the handler.
    match resolution {
        SessionResolution::Valid(claims) => {
            let access_token = read_cookie(req.headers(), ACCESS_TOKEN_COOKIE).unwrap_or_default();
            req.extensions_mut().insert(AuthenticatedUser {
                username: claims.username,
                access_token,
                refreshed: false,
            });
            next.run(req).await
        }
        SessionResolution::Refreshed(issued) => {
            tracing::info!(username = %issued.username, path = %req.uri().path(), "Session refreshed");
            metrics::record_session_issued("middleware_refresh");

            replace_access_cookie(&mut req, &issued.pair.access_token);
            req.extensions_mut().insert(AuthenticatedUser {
                username: issued.username.clone(),
                access_token: issued.pair.access_token.clone(),
                refreshed: true,
            });

            let mut response = next.run(req).await;
            prepend_set_cookies(response.headers_mut(), issued.cookies(&state.cookies));
            response
        }
    }
}

/// Point the in-flight request's `access_token` cookie at the new token so
/// downstream code reading cookies sees the refreshed session.
fn replace_access_cookie(req: &mut Request<Body>, access_token: &str) {
    let others: Vec<String> = req
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some(ACCESS_TOKEN_COOKIE))
        .map(String::from)
        .collect();

    let mut cookie = format!("{}={}", ACCESS_TOKEN_COOKIE, access_token);
    for pair in others {
        cookie.push_str("; ");
        cookie.push_str(&pair);
    }

    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            req.headers_mut().insert(COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "Failed to rewrite request cookies"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_only_the_access_cookie() {
        let mut req = Request::builder()
            .header(COOKIE, "access_token=old; refresh_token=r; csrf_token=c")
            .body(Body::empty())
            .unwrap();

        replace_access_cookie(&mut req, "new");

        assert_eq!(read_cookie(req.headers(), "access_token").as_deref(), Some("new"));
        assert_eq!(read_cookie(req.headers(), "refresh_token").as_deref(), Some("r"));
        assert_eq!(read_cookie(req.headers(), "csrf_token").as_deref(), Some("c"));
        assert_eq!(req.headers().get_all(COOKIE).iter().count(), 1);
    }

    #[test]
    fn adds_access_cookie_when_absent() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        replace_access_cookie(&mut req, "new");
        assert_eq!(read_cookie(req.headers(), "access_token").as_deref(), Some("new"));
    }
}
