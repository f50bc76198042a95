//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Process-level settings (environment, listener, secrets).
    pub app: ServerConfig,

    /// The seeded account served by the user directory.
    pub user: UserConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment.
///
/// Controls the `Secure` cookie attribute, header redaction in request logs
/// and the default console log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Deployment environment.
    pub environment: Environment,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// HMAC secret used to sign session tokens.
    pub jwt_secret: String,

    /// Static shared key handed to the dashboard in the `upload_key` cookie.
    pub upload_key: String,

    /// Total time allowed for a single request in seconds.
    pub request_timeout_secs: u64,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            bind_address: "0.0.0.0:8080".to_string(),
            jwt_secret: String::new(),
            upload_key: String::new(),
            request_timeout_secs: 30,
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Seeded account credentials.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UserConfig {
    pub username: String,
    pub password: String,
}

/// Cross-origin resource sharing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS response headers.
    pub enabled: bool,

    /// Origins allowed to make credentialed requests. `*` matches any origin.
    pub allowed_origins: Vec<String>,

    /// Methods advertised on preflight responses.
    pub allowed_methods: Vec<String>,

    /// Headers advertised on preflight responses.
    pub allowed_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: Vec::new(),
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: ["Content-Type", "X-CSRF-Token"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_age_secs: 86_400,
        }
    }
}

/// Backing store for rate-limit counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    /// Shared Redis instance; limits hold across all gateway processes.
    #[default]
    Redis,
    /// Process-local map; for single-instance deployments and tests.
    Memory,
}

/// How a window counter is advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CounterStrategy {
    /// Read the counter, then either start the window or increment.
    #[default]
    TwoStep,
    /// Single server-side increment that sets the expiry on creation.
    Atomic,
}

/// A request budget: `requests` per `period` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateRule {
    pub requests: u64,
    pub period: u64,
}

impl Default for RateRule {
    fn default() -> Self {
        Self {
            requests: 100,
            period: 60,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Counter store backend.
    pub backend: RateLimitBackend,

    /// Redis address; `host:port` or a full `redis://` URL.
    pub redis_url: String,

    /// Startup connectivity check deadline in seconds.
    pub connect_timeout_secs: u64,

    /// Deadline for each counter operation in milliseconds.
    pub operation_timeout_ms: u64,

    /// Counter update strategy.
    pub strategy: CounterStrategy,

    /// Rule applied to routes without an override.
    pub default_rate: RateRule,

    /// Per-route overrides keyed by exact request path.
    pub routes: HashMap<String, RateRule>,
}

impl RateLimitConfig {
    /// Normalized connection URL for the Redis backend.
    pub fn redis_connection_url(&self) -> String {
        let url = self.redis_url.trim();
        if url.is_empty() {
            "redis://localhost:6379".to_string()
        } else if url.contains("://") {
            url.to_string()
        } else {
            format!("redis://{}", url)
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: RateLimitBackend::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            connect_timeout_secs: 5,
            operation_timeout_ms: 1000,
            strategy: CounterStrategy::TwoStep,
            default_rate: RateRule::default(),
            routes: HashMap::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level override (trace, debug, info, warn, error).
    /// When unset the environment decides.
    pub log_level: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
