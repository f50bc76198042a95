//! Response envelope and rejection mapping.
//!
//! # Responsibilities
//! - Shape every JSON body as `{"success": .., "error"|"data": ..}`
//! - Map admission failures to status codes
//! - Keep internal error text out of client-visible bodies
//!
//! # Design Decisions
//! - Each stage terminates its own failures with a `Rejection`
//! - Messages are fixed strings; details go to the log, not the client

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::session::token::TokenError;

/// Standard API response body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            data: None,
        }
    }
}

/// Build an error response with the standard envelope.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiResponse::error(message))).into_response()
}

/// A terminal decision made by an admission stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No access or refresh token cookie.
    NoToken,
    Expired,
    InvalidSignature,
    Malformed,
    WrongTokenType,
    /// Login with unknown user or wrong password.
    InvalidCredentials,
    CsrfMissing,
    CsrfMismatch,
    RateLimitExceeded { retry_after_secs: u64 },
    /// The signing primitive failed; an outage signal, not routine.
    TokenSigningFailure,
    /// A collaborator failed while serving the request.
    Internal,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::NoToken
            | Rejection::Expired
            | Rejection::InvalidSignature
            | Rejection::Malformed
            | Rejection::WrongTokenType
            | Rejection::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Rejection::CsrfMissing | Rejection::CsrfMismatch => StatusCode::FORBIDDEN,
            Rejection::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::TokenSigningFailure | Rejection::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-visible message.
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::NoToken => "No token found",
            Rejection::Expired => "Token expired",
            Rejection::InvalidSignature | Rejection::Malformed => "Invalid token",
            Rejection::WrongTokenType => "Invalid token type",
            Rejection::InvalidCredentials => "Invalid credentials",
            Rejection::CsrfMissing => "Missing CSRF token",
            Rejection::CsrfMismatch => "Invalid CSRF token",
            Rejection::RateLimitExceeded { .. } => "Too many requests",
            Rejection::TokenSigningFailure => "Failed to generate tokens",
            Rejection::Internal => "Internal server error",
        }
    }

    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::NoToken => "no_token",
            Rejection::Expired => "expired",
            Rejection::InvalidSignature => "invalid_signature",
            Rejection::Malformed => "malformed",
            Rejection::WrongTokenType => "wrong_token_type",
            Rejection::InvalidCredentials => "invalid_credentials",
            Rejection::CsrfMissing => "csrf_missing",
            Rejection::CsrfMismatch => "csrf_mismatch",
            Rejection::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Rejection::TokenSigningFailure => "token_signing_failure",
            Rejection::Internal => "internal",
        }
    }
}

impl From<TokenError> for Rejection {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Rejection::Expired,
            TokenError::InvalidSignature => Rejection::InvalidSignature,
            TokenError::Malformed => Rejection::Malformed,
            TokenError::WrongTokenType { .. } => Rejection::WrongTokenType,
            TokenError::Signing(_) => Rejection::TokenSigningFailure,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut response = error_response(self.status(), self.message());
        if let Rejection::RateLimitExceeded { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
