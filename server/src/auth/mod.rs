//! Authentication Service
//!
//! Token issuance and verification, session revocation, and the request
//! gate middleware that attaches verified sessions to requests.

mod error;
mod handlers;
pub mod jwt;
mod middleware;
mod service;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};

use crate::api::AppState;
use crate::ratelimit::{rate_limit_by_ip, with_rule, RuleType};

pub use error::{AuthError, AuthResult, ErrorResponse};
pub use jwt::{TokenError, MIN_SECRET_LEN};
pub use middleware::{require_admin, require_auth, AuthSession, ADMIN_ROLE};
pub use service::{
    TokenConfig, TokenConfigError, TokenService, DEFAULT_AUTH_KEY_PREFIX, MAX_TOKEN_TTL_SECS,
};

/// Create authentication router.
///
/// Public routes (no auth required):
/// - POST /refresh - Exchange a refresh token for a new pair
///
/// Protected routes (auth required):
/// - POST /logout - Revoke the current session
/// - GET /session - Show the verified session
///
/// Every route is rate limited under the `general` rule before any token
/// is looked at.
pub fn router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new().route("/refresh", post(handlers::refresh_token));

    let protected_routes = Router::new()
        .route("/logout", post(handlers::logout))
        .route("/session", get(handlers::get_session))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(axum_middleware::from_fn_with_state(state, rate_limit_by_ip))
        .layer(axum_middleware::from_fn(with_rule(RuleType::General)))
}
