//! Session control.
//!
//! # Data Flow
//! ```text
//! Login / refresh:
//!     → token.rs (sign access + refresh pair)
//!     → security::csrf (fresh CSRF token)
//!     → cookies.rs (Set-Cookie values)
//!
//! Protected request:
//!     → cookies.rs (read access_token / refresh_token)
//!     → token.rs (validate, falling back to refresh)
//!     → reissue on fallback
//! ```
//!
//! # Design Decisions
//! - A session and its CSRF token are always issued together
//! - No server-side state: validity is signature plus embedded timestamps
//! - Superseded tokens are not revoked; they lapse at their own expiry

pub mod cookies;
pub mod token;

use axum::http::HeaderMap;
use axum_extra::extract::cookie::Cookie;

use crate::http::response::Rejection;
use crate::security::csrf::generate_csrf_token;
use cookies::{read_cookie, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};

pub use cookies::SessionCookies;
pub use token::{TokenClaims, TokenError, TokenKind, TokenPair, TokenService};

/// A freshly minted session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub username: String,
    pub pair: TokenPair,
    pub csrf_token: String,
}

impl IssuedSession {
    /// The token pair cookies followed by the CSRF cookie.
    pub fn cookies(&self, factory: &SessionCookies) -> [Cookie<'static>; 3] {
        let [access, refresh] = factory.session(&self.pair);
        [access, refresh, factory.csrf(&self.csrf_token)]
    }
}

/// Issue a token pair and a CSRF token for `username`.
pub fn issue_session(tokens: &TokenService, username: &str) -> Result<IssuedSession, TokenError> {
    Ok(IssuedSession {
        username: username.to_string(),
        pair: tokens.issue_pair(username)?,
        csrf_token: generate_csrf_token(),
    })
}

/// How a request's session was established.
#[derive(Debug, Clone)]
pub enum SessionResolution {
    /// The access token was valid as presented.
    Valid(TokenClaims),
    /// The access token was unusable; the refresh token minted a new session.
    Refreshed(IssuedSession),
}

impl SessionResolution {
    pub fn username(&self) -> &str {
        match self {
            SessionResolution::Valid(claims) => &claims.username,
            SessionResolution::Refreshed(issued) => &issued.username,
        }
    }
}

/// Resolve the session carried by request cookies.
///
/// A valid `access` token wins. Otherwise the refresh token is tried and, if
/// it is a valid `refresh` token, a new session is issued. With no refresh
/// cookie the access failure is reported (or `NoToken` if there was no access
/// cookie either).
pub fn resolve_session(
    tokens: &TokenService,
    headers: &HeaderMap,
) -> Result<SessionResolution, Rejection> {
    let access_failure = match read_cookie(headers, ACCESS_TOKEN_COOKIE) {
        Some(token) => match tokens.validate_kind(&token, TokenKind::Access) {
            Ok(claims) => return Ok(SessionResolution::Valid(claims)),
            Err(e) => {
                tracing::debug!(error = %e, "Access token rejected, trying refresh token");
                Rejection::from(e)
            }
        },
        None => Rejection::NoToken,
    };

    let Some(refresh_token) = read_cookie(headers, REFRESH_TOKEN_COOKIE) else {
        return Err(access_failure);
    };

    let claims = tokens.validate_kind(&refresh_token, TokenKind::Refresh)?;
    let issued = issue_session(tokens, &claims.username).map_err(|e| {
        tracing::error!(username = %claims.username, error = %e, "Failed to reissue session");
        Rejection::from(e)
    })?;

    Ok(SessionResolution::Refreshed(issued))
}
