//! Login, logout, refresh and verify endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::http::response::{error_response, Rejection};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::access_control::AuthenticatedUser;
use crate::session::cookies::{add_all, read_cookie, REFRESH_TOKEN_COOKIE};
use crate::session::{issue_session, resolve_session, SessionResolution, TokenKind};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsernameBody {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshBody {
    pub success: bool,
    pub username: String,
}

fn rejected(stage: &'static str, rejection: Rejection) -> Response {
    metrics::record_rejection(stage, rejection.reason());
    rejection.into_response()
}

/// `POST /api/login`
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid login request");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request");
        }
    };

    let user = match state.users.find_by_username(&request.username).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(username = %request.username, error = %e, "Failed to get user");
            return Rejection::Internal.into_response();
        }
    };

    let user = match user {
        Some(user) if user.password == request.password => user,
        _ => {
            tracing::warn!(username = %request.username, "Invalid login attempt");
            return rejected("login", Rejection::InvalidCredentials);
        }
    };

    let issued = match issue_session(&state.tokens, &user.username) {
        Ok(issued) => issued,
        Err(e) => {
            tracing::error!(username = %user.username, error = %e, "Failed to generate tokens");
            return Rejection::from(e).into_response();
        }
    };

    tracing::info!(username = %user.username, "User logged in");
    metrics::record_session_issued("login");

    let jar = add_all(jar, issued.cookies(&state.cookies));
    let jar = jar.add(state.cookies.upload_key(&state.config.app.upload_key));

    (
        jar,
        Json(UsernameBody {
            username: user.username,
        }),
    )
        .into_response()
}

/// `POST /api/logout`
///
/// Only the client's cookies are cleared; the tokens stay valid until they
/// expire.
pub async fn logout(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    jar: CookieJar,
) -> impl IntoResponse {
    if let Some(Extension(user)) = user {
        tracing::info!(username = %user.username, "User logged out");
    }

    (
        add_all(jar, state.cookies.clear_all()),
        Json(MessageBody {
            message: "Logged out successfully".to_string(),
        }),
    )
}

/// `POST /api/refresh`
pub async fn refresh(State(state): State<AppState>, jar: CookieJar, headers: HeaderMap) -> Response {
    let Some(token) = read_cookie(&headers, REFRESH_TOKEN_COOKIE) else {
        return rejected("refresh", Rejection::NoToken);
    };

    let claims = match state.tokens.validate_kind(&token, TokenKind::Refresh) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "Refresh token rejected");
            return rejected("refresh", Rejection::from(e));
        }
    };

    let issued = match issue_session(&state.tokens, &claims.username) {
        Ok(issued) => issued,
        Err(e) => {
            tracing::error!(username = %claims.username, error = %e, "Failed to generate new tokens");
            return Rejection::from(e).into_response();
        }
    };

    metrics::record_session_issued("refresh");

    (
        add_all(jar, issued.cookies(&state.cookies)),
        Json(RefreshBody {
            success: true,
            username: issued.username,
        }),
    )
        .into_response()
}

/// `GET /api/verify`
///
/// Same resolution as the authentication stage, including the refresh
/// fallback and cookie rotation.
pub async fn verify(State(state): State<AppState>, jar: CookieJar, headers: HeaderMap) -> Response {
    match resolve_session(&state.tokens, &headers) {
        Ok(SessionResolution::Valid(claims)) => Json(UsernameBody {
            username: claims.username,
        })
        .into_response(),
        Ok(SessionResolution::Refreshed(issued)) => {
            metrics::record_session_issued("verify");
            let jar = add_all(jar, issued.cookies(&state.cookies));
            (
                jar,
                Json(UsernameBody {
                    username: issued.username,
                }),
            )
                .into_response()
        }
        Err(rejection) => rejected("verify", rejection),
    }
}
