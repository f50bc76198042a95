//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Hold the shared, read-only application state
//! - Merge gateway routes with the embedding application's routes
//! - Wrap everything in the admission pipeline
//! - Serve over plain TCP or TLS with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::handlers;
use crate::http::pipeline::build_pipeline;
use crate::lifecycle::Shutdown;
use crate::security::cors::CorsPolicy;
use crate::security::rate_limit::RateLimiter;
use crate::session::{SessionCookies, TokenService};
use crate::store::{CounterStore, UserDirectory};

/// How long TLS connections get to finish after shutdown is triggered.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into stages and handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub cookies: SessionCookies,
    pub rate_limiter: Arc<RateLimiter>,
    pub cors: Arc<CorsPolicy>,
    pub users: Arc<dyn UserDirectory>,
}

impl AppState {
    /// Derive every component from configuration plus the two collaborators.
    pub fn new(
        config: Arc<AppConfig>,
        counters: Arc<dyn CounterStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            tokens: Arc::new(TokenService::new(&config.app.jwt_secret)),
            cookies: SessionCookies::new(config.app.environment.is_production()),
            rate_limiter: Arc::new(RateLimiter::new(counters, &config.rate_limit)),
            cors: Arc::new(CorsPolicy::from_config(&config.cors)),
            users,
            config,
        }
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<AppConfig>,
}

impl HttpServer {
    /// Gateway routes only.
    pub fn new(state: AppState) -> Self {
        Self::with_routes(state, Router::new())
    }

    /// Gateway routes merged with the application's own routes.
    pub fn with_routes(state: AppState, app: Router) -> Self {
        let routes = handlers::routes(state.clone()).merge(app);
        Self {
            router: build_pipeline(routes, &state),
            config: state.config,
        }
    }

    /// The fully wrapped router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener until
    /// shutdown is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, environment = %self.config.app.environment, "HTTP server starting");

        let mut stop = shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: &Shutdown,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, environment = %self.config.app.environment, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let mut stop = shutdown.subscribe();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = stop.recv().await;
            tracing::info!("Draining in-flight requests");
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}
