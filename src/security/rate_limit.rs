//! Fixed-window rate limiting per (route, client IP).
//!
//! Counters live in a [`CounterStore`] so every gateway instance sees the
//! same window. The limiter favours availability: when the store errors or
//! times out the request is admitted and the failure is logged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::{CounterStrategy, RateLimitConfig, RateRule};
use crate::http::request::client_ip_of;
use crate::http::response::Rejection;
use crate::observability::metrics;
use crate::store::{CounterStore, StoreError};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Within budget; `count` is the request's position in the window.
    Admitted { count: u64 },
    /// Budget exhausted for this window.
    Rejected { rule: RateRule },
    /// The store failed; admitted anyway.
    FailedOpen,
    /// Rate limiting is turned off.
    Bypassed,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Rejected { .. })
    }
}

/// A store call that failed, tagged with the operation for logs and metrics.
#[derive(Debug)]
struct StoreFailure {
    operation: &'static str,
    error: StoreError,
}

fn tag(operation: &'static str) -> impl FnOnce(StoreError) -> StoreFailure {
    move |error| StoreFailure { operation, error }
}

pub struct RateLimiter {
    store: Option<Arc<dyn CounterStore>>,
    strategy: CounterStrategy,
    default_rule: RateRule,
    routes: HashMap<String, RateRule>,
}

impl RateLimiter {
    /// A pass-through limiter.
    pub fn disabled() -> Self {
        Self {
            store: None,
            strategy: CounterStrategy::default(),
            default_rule: RateRule::default(),
            routes: HashMap::new(),
        }
    }

    /// Build from configuration. A disabled config yields a pass-through.
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self {
            store: Some(store),
            strategy: config.strategy,
            default_rule: config.default_rate,
            routes: config.routes.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Exact-path override, else the default rule.
    pub fn rule_for(&self, route: &str) -> RateRule {
        self.routes.get(route).copied().unwrap_or(self.default_rule)
    }

    pub fn key_for(route: &str, client_ip: &str) -> String {
        format!("rate_limit:{}:{}", route, client_ip)
    }

    /// Count this request against its window and decide.
    pub async fn check(&self, route: &str, client_ip: &str) -> Admission {
        let Some(store) = &self.store else {
            return Admission::Bypassed;
        };

        let rule = self.rule_for(route);
        let key = Self::key_for(route, client_ip);

        let outcome = match self.strategy {
            CounterStrategy::TwoStep => read_then_write(store.as_ref(), &key, rule).await,
            CounterStrategy::Atomic => increment_atomically(store.as_ref(), &key, rule).await,
        };

        match outcome {
            Ok(admission) => admission,
            Err(failure) => {
                tracing::error!(
                    route = %route,
                    client_ip = %client_ip,
                    backend = store.name(),
                    operation = failure.operation,
                    error = %failure.error,
                    "Rate limit store failure, admitting request"
                );
                metrics::record_store_failure(failure.operation);
                Admission::FailedOpen
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("enabled", &self.is_enabled())
            .field("strategy", &self.strategy)
            .field("default_rule", &self.default_rule)
            .field("routes", &self.routes)
            .finish()
    }
}

/// The two-step fixed-window update: read the counter, then either open a
/// new window or increment.
///
/// Not atomic. Concurrent first requests in a window can each see an absent
/// key and each reset it to 1, so a burst at a window edge may admit more
/// than `rule.requests`.
async fn read_then_write(
    store: &dyn CounterStore,
    key: &str,
    rule: RateRule,
) -> Result<Admission, StoreFailure> {
    match store.get(key).await.map_err(tag("get"))? {
        None => {
            store
                .start_window(key, Duration::from_secs(rule.period))
                .await
                .map_err(tag("start_window"))?;
            Ok(Admission::Admitted { count: 1 })
        }
        Some(count) if count < rule.requests => {
            // The key may expire between the read and this write; the store
            // then opens a fresh window instead of an unbounded counter.
            let count = store
                .increment(key, Duration::from_secs(rule.period))
                .await
                .map_err(tag("increment"))?;
            Ok(Admission::Admitted { count })
        }
        Some(_) => Ok(Admission::Rejected { rule }),
    }
}

/// Single server-side increment. Rejected requests still count, which keeps
/// the key saturated until the window expires.
async fn increment_atomically(
    store: &dyn CounterStore,
    key: &str,
    rule: RateRule,
) -> Result<Admission, StoreFailure> {
    let count = store
        .increment(key, Duration::from_secs(rule.period))
        .await
        .map_err(tag("increment"))?;

    if count <= rule.requests {
        Ok(Admission::Admitted { count })
    } else {
        Ok(Admission::Rejected { rule })
    }
}

/// Pipeline stage: throttle by request path and client IP.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let client_ip = client_ip_of(&request).unwrap_or_else(|| "unknown".to_string());
    let route = request.uri().path().to_string();

    match limiter.check(&route, &client_ip).await {
        Admission::Rejected { rule } => {
            tracing::warn!(
                route = %route,
                client_ip = %client_ip,
                limit = rule.requests,
                window_secs = rule.period,
                "Rate limit exceeded"
            );
            let rejection = Rejection::RateLimitExceeded {
                retry_after_secs: rule.period,
            };
            metrics::record_rejection("rate_limit", rejection.reason());
            rejection.into_response()
        }
        _ => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCounterStore;
    use async_trait::async_trait;

    struct UnreachableStore;

    #[async_trait]
    impl CounterStore for UnreachableStore {
        fn name(&self) -> &'static str {
            "unreachable"
        }
        async fn get(&self, _key: &str) -> Result<Option<u64>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn start_window(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn increment(&self, _key: &str, _ttl: Duration) -> Result<u64, StoreError> {
            Err(StoreError::Timeout(Duration::from_millis(100)))
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    /// Memory store whose `get` replies arrive 50ms after the read.
    struct SlowReads(MemoryCounterStore);

    #[async_trait]
    impl CounterStore for SlowReads {
        fn name(&self) -> &'static str {
            "slow"
        }
        async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
            let value = self.0.get(key).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            value
        }
        async fn start_window(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
            self.0.start_window(key, ttl).await
        }
        async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
            self.0.increment(key, ttl).await
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// Log lines written by a scoped subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn config(strategy: CounterStrategy) -> RateLimitConfig {
        let mut config = RateLimitConfig {
            enabled: true,
            strategy,
            ..RateLimitConfig::default()
        };
        config.routes.insert(
            "/api/upload".into(),
            RateRule {
                requests: 5,
                period: 10,
            },
        );
        config
    }

    fn limiter(strategy: CounterStrategy) -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryCounterStore::new()), &config(strategy))
    }

    async fn window_scenario(limiter: RateLimiter) {
        for n in 1..=5 {
            let admission = limiter.check("/api/upload", "1.2.3.4").await;
            assert_eq!(admission, Admission::Admitted { count: n });
            tokio::time::advance(Duration::from_millis(500)).await;
        }

        tokio::time::advance(Duration::from_millis(500)).await; // t = 3s
        assert_eq!(
            limiter.check("/api/upload", "1.2.3.4").await,
            Admission::Rejected {
                rule: RateRule {
                    requests: 5,
                    period: 10
                }
            }
        );

        tokio::time::advance(Duration::from_secs(8)).await; // t = 11s
        assert_eq!(
            limiter.check("/api/upload", "1.2.3.4").await,
            Admission::Admitted { count: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn two_step_fixed_window() {
        window_scenario(limiter(CounterStrategy::TwoStep)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn atomic_fixed_window() {
        window_scenario(limiter(CounterStrategy::Atomic)).await;
    }

    #[tokio::test]
    async fn routes_and_clients_are_counted_separately() {
        let limiter = limiter(CounterStrategy::TwoStep);
        for _ in 0..5 {
            limiter.check("/api/upload", "1.2.3.4").await;
        }
        assert!(!limiter.check("/api/upload", "1.2.3.4").await.is_admitted());
        assert!(limiter.check("/api/upload", "5.6.7.8").await.is_admitted());
        assert!(limiter.check("/api/list", "1.2.3.4").await.is_admitted());
    }

    #[test]
    fn rule_resolution_falls_back_to_default() {
        let limiter = limiter(CounterStrategy::TwoStep);
        assert_eq!(limiter.rule_for("/api/upload").requests, 5);
        assert_eq!(limiter.rule_for("/api/upload/"), RateRule::default());
        assert_eq!(
            RateLimiter::key_for("/api/upload", "1.2.3.4"),
            "rate_limit:/api/upload:1.2.3.4"
        );
    }

    #[tokio::test]
    async fn store_failure_fails_open() {
        for strategy in [CounterStrategy::TwoStep, CounterStrategy::Atomic] {
            let limiter = RateLimiter::new(Arc::new(UnreachableStore), &config(strategy));
            for _ in 0..20 {
                assert_eq!(
                    limiter.check("/api/upload", "1.2.3.4").await,
                    Admission::FailedOpen
                );
            }
        }
    }

    #[tokio::test]
    async fn every_fail_open_admission_is_logged() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        for strategy in [CounterStrategy::TwoStep, CounterStrategy::Atomic] {
            let limiter = RateLimiter::new(Arc::new(UnreachableStore), &config(strategy));
            for _ in 0..3 {
                assert_eq!(
                    limiter.check("/api/upload", "1.2.3.4").await,
                    Admission::FailedOpen
                );
            }
        }

        let output = logs.contents();
        let events: Vec<&str> = output
            .lines()
            .filter(|line| line.contains("Rate limit store failure, admitting request"))
            .collect();
        assert_eq!(events.len(), 6, "{output}");
        assert!(events.iter().all(|line| line.contains("ERROR")));
        assert!(events.iter().all(|line| line.contains("client_ip=1.2.3.4")));
        assert_eq!(events.iter().filter(|l| l.contains("operation=\"get\"")).count(), 3);
        assert_eq!(
            events.iter().filter(|l| l.contains("operation=\"increment\"")).count(),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn increment_racing_expiry_does_not_lock_out() {
        let rule = RateRule {
            requests: 2,
            period: 10,
        };
        let mut config = config(CounterStrategy::TwoStep);
        config.default_rate = rule;
        let limiter = RateLimiter::new(Arc::new(SlowReads(MemoryCounterStore::new())), &config);

        // Window opens at t=0.05s and expires at t=10.05s.
        assert_eq!(
            limiter.check("/api/list", "1.2.3.4").await,
            Admission::Admitted { count: 1 }
        );

        // Read at t=10.03s sees the live counter; the increment lands after expiry.
        tokio::time::advance(Duration::from_millis(9_980)).await;
        assert_eq!(
            limiter.check("/api/list", "1.2.3.4").await,
            Admission::Admitted { count: 1 }
        );

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(3600)).await;
            assert_eq!(
                limiter.check("/api/list", "1.2.3.4").await,
                Admission::Admitted { count: 1 }
            );
        }
    }

    #[tokio::test]
    async fn disabled_limiter_bypasses_store() {
        let config = RateLimitConfig {
            enabled: false,
            ..config(CounterStrategy::TwoStep)
        };
        let limiter = RateLimiter::new(Arc::new(UnreachableStore), &config);

        assert!(!limiter.is_enabled());
        assert_eq!(limiter.check("/api/upload", "1.2.3.4").await, Admission::Bypassed);
    }
}
