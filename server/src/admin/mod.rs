//! Rate Limit Admin Module
//!
//! Operator endpoints over the rate limiter: rule table, key stats, and
//! per-identifier status and reset. Every route requires the `admin` role.

pub mod handlers;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};

use crate::api::AppState;
use crate::auth::{require_admin, require_auth};
use crate::ratelimit::{rate_limit_by_ip, with_rule, RuleType};

/// Create the admin router.
///
/// Layer order (outermost first): rule, rate limit, auth, admin role.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/ratelimit/rules", get(handlers::get_rules))
        .route("/ratelimit/stats", get(handlers::get_stats))
        .route(
            "/ratelimit/{rule}/{identifier}",
            get(handlers::get_status).delete(handlers::clear),
        )
        .layer(from_fn(require_admin))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .layer(from_fn_with_state(state, rate_limit_by_ip))
        .layer(from_fn(with_rule(RuleType::General)))
}
