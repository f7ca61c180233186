//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum
//! router over an in-memory cache store, plus token and store helpers.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{self, header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use warden_common::{ClaimSet, TokenPair};
use warden_server::api::{create_router, AppState};
use warden_server::auth::TokenService;
use warden_server::cache::{CacheError, CacheStore, MemoryStore, WindowAdmission, WindowState};
use warden_server::config::Config;
use warden_server::ratelimit::{RateLimitConfig, RateLimiter};

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<dyn CacheStore>,
}

impl TestApp {
    /// Create a test app with the default test config and a fresh memory store.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    /// Create a test app with a custom config (for limit testing).
    pub fn with_config(config: Config) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Create a test app over the given store.
    pub fn with_store(config: Config, store: Arc<dyn CacheStore>) -> Self {
        let tokens = TokenService::new(config.token.clone(), Arc::clone(&store));
        let rate_limiter = RateLimiter::new(Arc::clone(&store), config.rate_limit.clone());
        let state = AppState::new(tokens, rate_limiter, config);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            store,
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Build a request carrying a bearer token.
    pub fn authed(method: Method, uri: &str, token: &str) -> http::request::Builder {
        Self::request(method, uri).header(header::AUTHORIZATION, format!("Bearer {token}"))
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Issue a token pair for a user with the given roles.
    pub fn issue_tokens(&self, roles: &[&str]) -> TokenPair {
        let claims = ClaimSet::new("user-1", "user@example.com", roles.iter().copied());
        self.state
            .tokens
            .create_token_pair(&claims)
            .expect("Failed to issue tokens")
    }
}

/// Test config with a rate limit override for one rule.
pub fn config_with_rate_limit(rate_limit: RateLimitConfig) -> Config {
    Config {
        rate_limit,
        ..Config::default_for_test()
    }
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

/// A cache store that is always down.
pub struct FailingStore;

fn down() -> CacheError {
    CacheError::Unavailable("store is down".into())
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(down())
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(down())
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Err(down())
    }

    async fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, CacheError> {
        Err(down())
    }

    async fn window_admit(
        &self,
        _key: &str,
        _now_ms: i64,
        _window_ms: u64,
        _limit: u32,
    ) -> Result<WindowAdmission, CacheError> {
        Err(down())
    }

    async fn window_peek(
        &self,
        _key: &str,
        _now_ms: i64,
        _window_ms: u64,
    ) -> Result<WindowState, CacheError> {
        Err(down())
    }
}
