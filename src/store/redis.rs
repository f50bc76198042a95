//! Redis-backed counters shared by every service instance.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, Script};
use tokio::time::timeout;

use super::{CounterStore, StoreError};

/// INCR, then EXPIRE if this call created the key or found one without a TTL.
const INCREMENT_WITH_EXPIRY: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

pub struct RedisCounterStore {
    manager: ConnectionManager,
    op_timeout: Duration,
    increment_script: Script,
}

impl RedisCounterStore {
    /// Connect and verify reachability with PING.
    ///
    /// Both the connection and the PING must finish within `connect_timeout`.
    pub async fn connect(
        url: &str,
        connect_timeout: Duration,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        tracing::info!(url = %url, "Connecting to Redis");

        let client = Client::open(url).map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let manager = timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(connect_timeout))?
            .map_err(map_redis_error)?;

        let store = Self {
            manager,
            op_timeout: connect_timeout,
            increment_script: Script::new(INCREMENT_WITH_EXPIRY),
        };
        store.ping().await?;

        tracing::info!(url = %url, "Redis connection verified");
        Ok(Self {
            op_timeout,
            ..store
        })
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        timeout(self.op_timeout, op)
            .await
            .map_err(|_| StoreError::Timeout(self.op_timeout))?
            .map_err(map_redis_error)
    }
}

fn map_redis_error(err: RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Command(err.to_string())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self.manager.clone();
        self.bounded(async move {
            let value: Option<u64> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
            Ok(value)
        })
        .await
    }

    async fn start_window(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        self.bounded(async move {
            let _: () = redis::cmd("SET")
                .arg(key)
                .arg(1)
                .arg("EX")
                .arg(ttl.as_secs())
                .query_async(&mut conn)
                .await?;
            Ok(())
        })
        .await
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let mut conn = self.manager.clone();
        let mut invocation = self.increment_script.key(key);
        invocation.arg(ttl.as_secs());
        self.bounded(async move {
            let count: u64 = invocation.invoke_async(&mut conn).await?;
            Ok(count)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let pong: String = self
            .bounded(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;

        if pong != "PONG" {
            return Err(StoreError::Command(format!("unexpected PING reply: {pong}")));
        }
        Ok(())
    }
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}
