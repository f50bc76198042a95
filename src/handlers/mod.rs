//! Route handlers owned by the gateway.
//!
//! Everything else (uploads, listings, stats, the frontend) is supplied by
//! the embedding application as an `axum::Router` and wrapped by the same
//! pipeline.

pub mod health;
pub mod session;

use axum::{
    routing::{get, post},
    Router,
};

use crate::http::server::AppState;
use crate::security::routes::{LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH, VERIFY_PATH};

pub const HEALTH_PATH: &str = "/health";

/// Session and health routes. Wrong methods get axum's 405.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(LOGIN_PATH, post(session::login))
        .route(LOGOUT_PATH, post(session::logout))
        .route(REFRESH_PATH, post(session::refresh))
        .route(VERIFY_PATH, get(session::verify))
        .route(HEALTH_PATH, get(health::health))
        .with_state(state)
}
