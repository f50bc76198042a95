//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, graceful shutdown)
//!     → pipeline.rs (request ID, logging, admission stages)
//!     → request.rs (client IP, request ID helpers)
//!     → handlers / application routes
//!     → response.rs (JSON envelope, rejection mapping)
//!     → Send to client
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::build_pipeline;
pub use request::{client_ip, X_REQUEST_ID};
pub use response::{ApiResponse, Rejection};
pub use server::{AppState, HttpServer};
