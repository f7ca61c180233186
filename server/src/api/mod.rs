//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::{admin, auth, auth::TokenService, config::Config, ratelimit::RateLimiter};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Token issuance, verification, and revocation
    pub tokens: Arc<TokenService>,
    /// Rate limiter over the shared cache store
    pub rate_limiter: RateLimiter,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(tokens: TokenService, rate_limiter: RateLimiter, config: Config) -> Self {
        Self {
            tokens: Arc::new(tokens),
            rate_limiter,
            config: Arc::new(config),
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Token refresh, logout, session
        .nest("/auth", auth::router(state.clone()))
        // Operator endpoints
        .nest("/admin", admin::router(state.clone()))
        // Middleware
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Whether rate limiting is enabled
    rate_limiting: bool,
    /// Cache backend in use
    cache_backend: &'static str,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rate_limiting: state.rate_limiter.config().enabled,
        cache_backend: state.config.cache_backend.as_str(),
    })
}
