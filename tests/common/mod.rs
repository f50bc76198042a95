//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use admission_gateway::config::{
    AppConfig, CorsConfig, RateLimitBackend, RateLimitConfig, RateRule, ServerConfig, UserConfig,
};
use admission_gateway::http::server::{AppState, HttpServer};
use admission_gateway::security::access_control::AuthenticatedUser;
use admission_gateway::session::cookies::{read_cookie, ACCESS_TOKEN_COOKIE};
use admission_gateway::session::{TokenClaims, TokenKind, TokenService};
use admission_gateway::store::{
    CounterStore, MemoryCounterStore, StaticUserDirectory, StoreError,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "hunter2";
pub const UPLOAD_KEY: &str = "upload-key-123";
pub const ALLOWED_ORIGIN: &str = "https://app.example.com";

/// Memory-backed config with a tight budget on the upload route.
pub fn test_config() -> AppConfig {
    let mut routes = HashMap::new();
    routes.insert(
        "/api/upload".to_string(),
        RateRule {
            requests: 5,
            period: 10,
        },
    );

    AppConfig {
        app: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            jwt_secret: SECRET.to_string(),
            upload_key: UPLOAD_KEY.to_string(),
            ..ServerConfig::default()
        },
        user: UserConfig {
            username: USERNAME.to_string(),
            password: PASSWORD.to_string(),
        },
        cors: CorsConfig {
            enabled: true,
            allowed_origins: vec![ALLOWED_ORIGIN.to_string()],
            ..CorsConfig::default()
        },
        rate_limit: RateLimitConfig {
            enabled: true,
            backend: RateLimitBackend::Memory,
            routes,
            ..RateLimitConfig::default()
        },
        ..AppConfig::default()
    }
}

/// Counter store that fails every call and counts how often it was asked.
#[derive(Default)]
pub struct FailingStore {
    pub calls: AtomicUsize,
}

impl FailingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self) -> StoreError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StoreError::Unavailable("connection refused".to_string())
    }
}

#[async_trait]
impl CounterStore for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> Result<Option<u64>, StoreError> {
        Err(self.fail())
    }

    async fn start_window(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(self.fail())
    }

    async fn increment(&self, _key: &str, _ttl: Duration) -> Result<u64, StoreError> {
        Err(self.fail())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(self.fail())
    }
}

/// Output of a thread-local `tracing` subscriber installed for one test.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a plain-text subscriber for the current thread.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Lines containing `message`.
    pub fn count(&self, message: &str) -> usize {
        self.contents().lines().filter(|l| l.contains(message)).count()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stand-ins for the application routes the gateway wraps.
pub fn application_routes() -> Router {
    Router::new()
        .route(
            "/api/list",
            get(
                |Extension(user): Extension<AuthenticatedUser>, headers: HeaderMap| async move {
                    Json(json!({
                        "username": user.username,
                        "access_token": user.access_token,
                        "refreshed": user.refreshed,
                        "cookie_token": read_cookie(&headers, ACCESS_TOKEN_COOKIE),
                    }))
                },
            ),
        )
        .route("/api/items", post(|| async { Json(json!({ "created": true })) }))
        .route("/api/upload", post(|| async { "stored" }))
        .route("/dashboard", get(|| async { "dashboard" }))
}

pub fn build_state(config: AppConfig, counters: Arc<dyn CounterStore>) -> AppState {
    let users = Arc::new(StaticUserDirectory::from_config(&config.user));
    AppState::new(Arc::new(config), counters, users)
}

pub fn build_app_with(config: AppConfig, counters: Arc<dyn CounterStore>) -> Router {
    HttpServer::with_routes(build_state(config, counters), application_routes()).router()
}

pub fn build_app() -> Router {
    build_app_with(test_config(), Arc::new(MemoryCounterStore::new()))
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Raw `Set-Cookie` values on a response.
pub fn set_cookie_headers(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Cookie name to value, last write wins.
pub fn set_cookies(response: &Response<Body>) -> HashMap<String, String> {
    set_cookie_headers(response)
        .iter()
        .filter_map(|raw| {
            let pair = raw.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::post("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap()
}

/// Log in as the seeded user and return the issued cookies.
pub async fn login(app: &Router) -> HashMap<String, String> {
    let response = send(app, login_request(USERNAME, PASSWORD)).await;
    assert!(response.status().is_success(), "login failed: {}", response.status());
    set_cookies(&response)
}

/// Render cookies as a request `Cookie` header value.
pub fn cookie_header(cookies: &[(&str, &str)]) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// A correctly signed token of `kind` whose expiry has already passed.
pub fn expired_token(kind: TokenKind) -> String {
    let now = unix_now();
    let claims = TokenClaims {
        username: USERNAME.to_string(),
        token_type: kind,
        iat: now - 3600,
        exp: now - 60,
    };
    TokenService::new(SECRET).sign(&claims).unwrap()
}
