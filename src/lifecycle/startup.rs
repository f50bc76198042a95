//! Startup orchestration.
//!
//! # Order
//! ```text
//! load config → logging → metrics → counter store (verified) → state → bind → serve
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The counter store must answer a PING before traffic is accepted
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{load_config, AppConfig, ConfigError};
use crate::http::server::{AppState, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::net::tls::load_tls_config;
use crate::observability::{logging, metrics};
use crate::store::{connect_counter_store, CounterStore, MemoryCounterStore, StaticUserDirectory, StoreError};

/// Errors that stop the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid address {address}: {source}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },

    #[error("counter store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("failed to load TLS material: {0}")]
    Tls(std::io::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

fn parse_addr(address: &str) -> Result<SocketAddr, StartupError> {
    address.parse().map_err(|source| StartupError::Address {
        address: address.to_string(),
        source,
    })
}

/// Connect the counter backend, or hand back an idle in-memory one when rate
/// limiting is off.
pub async fn counter_store(config: &AppConfig) -> Result<Arc<dyn CounterStore>, StartupError> {
    if !config.rate_limit.enabled {
        tracing::info!("Rate limiting disabled");
        return Ok(Arc::new(MemoryCounterStore::new()));
    }

    match connect_counter_store(&config.rate_limit).await {
        Ok(store) => Ok(store),
        Err(e) => {
            tracing::error!(error = %e, "Counter store check failed");
            Err(e.into())
        }
    }
}

/// Build application state from loaded configuration.
pub async fn build_state(config: AppConfig) -> Result<AppState, StartupError> {
    let counters = counter_store(&config).await?;
    let users = Arc::new(StaticUserDirectory::from_config(&config.user));
    Ok(AppState::new(Arc::new(config), counters, users))
}

/// Run the service until a termination signal.
pub async fn run(config_path: &Path) -> Result<(), StartupError> {
    let config = load_config(config_path)?;

    logging::init_logging(config.app.environment, &config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        environment = %config.app.environment,
        "admission-gateway starting"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(parse_addr(&config.observability.metrics_address)?)?;
    }

    let bind_address = config.app.bind_address.clone();
    let tls = config.app.tls.clone();

    let state = build_state(config).await?;
    let server = HttpServer::new(state);

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await.map_err(StartupError::Tls)?;
            server
                .run_tls(parse_addr(&bind_address)?, rustls, &shutdown)
                .await
                .map_err(StartupError::Serve)?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address)
                .await
                .map_err(|source| StartupError::Bind {
                    address: bind_address.clone(),
                    source,
                })?;
            server
                .run(listener, &shutdown)
                .await
                .map_err(StartupError::Serve)?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
