//! External collaborators consulted by the admission layer.
//!
//! # Data Flow
//! ```text
//! RateLimiter
//!     → CounterStore (redis.rs for shared deployments, memory.rs otherwise)
//!
//! Login handler
//!     → UserDirectory (users.rs)
//! ```
//!
//! # Design Decisions
//! - The counter store is the only shared mutable resource
//! - Every store call is bounded; a timeout is just another store failure
//! - Backends are chosen once at startup and shared behind an `Arc`

pub mod memory;
pub mod redis;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{RateLimitBackend, RateLimitConfig};

pub use memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;
pub use users::{StaticUserDirectory, UserDirectory, UserRecord};

/// Errors from an external store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within its deadline.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with an error.
    #[error("store command failed: {0}")]
    Command(String),
}

/// Integer counters with per-key expiry.
///
/// Keys are created lazily and disappear when their TTL lapses. No operation
/// here is retried; callers decide what a failure means.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Current value, or `None` if the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Set the key to 1 with the given TTL, replacing any previous value.
    async fn start_window(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Add one and return the new value. A live key keeps its TTL; a key this
    /// call creates (absent, or expired since it was last read) gets `ttl`.
    /// Atomic on the store side, so no counter ever outlives its window.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;

    /// Round-trip check used at startup.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Build and verify the configured counter backend.
///
/// For Redis this connects and pings within `connect_timeout_secs`; an error
/// here should stop the service from starting.
pub async fn connect_counter_store(
    config: &RateLimitConfig,
) -> Result<Arc<dyn CounterStore>, StoreError> {
    let store: Arc<dyn CounterStore> = match config.backend {
        RateLimitBackend::Memory => Arc::new(MemoryCounterStore::new()),
        RateLimitBackend::Redis => Arc::new(
            RedisCounterStore::connect(
                &config.redis_connection_url(),
                Duration::from_secs(config.connect_timeout_secs),
                Duration::from_millis(config.operation_timeout_ms),
            )
            .await?,
        ),
    };

    tracing::info!(backend = store.name(), "Counter store ready");
    Ok(store)
}
