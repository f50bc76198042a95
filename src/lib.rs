//! Request admission and session control for the image-hosting service.
//!
//! Every request passes one fixed pipeline: logging, rate limiting, CORS,
//! CSRF, then authentication, before it reaches a route handler.

pub mod config;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod session;
pub mod store;

pub use config::schema::AppConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
