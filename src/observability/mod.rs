//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → logging.rs (request span, one DEBUG line per request)
//!     → metrics.rs (request count and latency)
//!
//! Admission stages:
//!     → WARN event per rejection, ERROR per counter-store failure
//!     → metrics.rs (rejections, store failures, sessions issued)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing in production
//! - Request ID flows through the request span
//! - Metrics are cheap (atomic increments) and optional to export

pub mod logging;
pub mod metrics;
