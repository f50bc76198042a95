//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rate rules > 0, timeouts > 0)
//! - Check the listener address and TLS paths are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use redis::IntoConnectionInfo;

use crate::config::schema::{AppConfig, RateLimitBackend, RateRule};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.app.jwt_secret.trim().is_empty() {
        errors.push(ValidationError::new("app.jwt_secret", "must not be empty"));
    }

    if config.app.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "app.bind_address",
            format!("'{}' is not a socket address", config.app.bind_address),
        ));
    }

    if config.app.request_timeout_secs == 0 {
        errors.push(ValidationError::new("app.request_timeout_secs", "must be greater than 0"));
    }

    if let Some(tls) = &config.app.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("app.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("app.tls.key_path", "must not be empty"));
        }
    }

    if config.user.username.is_empty() {
        errors.push(ValidationError::new("user.username", "must not be empty"));
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        check_rule("rate_limit.default_rate", &rl.default_rate, &mut errors);

        for (route, rule) in &rl.routes {
            let field = format!("rate_limit.routes.\"{}\"", route);
            if !route.starts_with('/') {
                errors.push(ValidationError::new(field.clone(), "route must start with '/'"));
            }
            check_rule(&field, rule, &mut errors);
        }

        if rl.connect_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "rate_limit.connect_timeout_secs",
                "must be greater than 0",
            ));
        }
        if rl.operation_timeout_ms == 0 {
            errors.push(ValidationError::new(
                "rate_limit.operation_timeout_ms",
                "must be greater than 0",
            ));
        }
        if rl.backend == RateLimitBackend::Redis
            && rl.redis_connection_url().as_str().into_connection_info().is_err()
        {
            errors.push(ValidationError::new(
                "rate_limit.redis_url",
                format!("'{}' is not a valid redis address", rl.redis_url),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_rule(field: &str, rule: &RateRule, errors: &mut Vec<ValidationError>) {
    if rule.requests == 0 {
        errors.push(ValidationError::new(format!("{}.requests", field), "must be greater than 0"));
    }
    if rule.period == 0 {
        errors.push(ValidationError::new(format!("{}.period", field), "must be greater than 0"));
    }
}
