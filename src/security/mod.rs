//! Admission stages.
//!
//! # Data Flow
//! ```text
//! Incoming request (after logging):
//!     → rate_limit.rs (per route + client IP window, fail open)
//!     → cors.rs (preflight answers, origin echo)
//!     → csrf.rs (double-submit check on unsafe methods)
//!     → access_control.rs (session required on private API routes)
//!     → Route handler
//! ```
//!
//! # Design Decisions
//! - Fixed order, composed once by the pipeline builder
//! - Each stage terminates its own failures; nothing half-handled moves on
//! - Fail closed on credentials, fail open on counter-store outages
//! - routes.rs is the single source of path classes

pub mod access_control;
pub mod cors;
pub mod csrf;
pub mod rate_limit;
pub mod routes;
