//! Axum middleware for rate limiting.
//!
//! The rate limit runs ahead of authentication, so requests are keyed by
//! the normalized client IP.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::AppState;
use crate::ratelimit::{ClientIp, NormalizedIp, RateLimitError, RuleType};

/// Middleware to rate limit requests by client IP address.
///
/// The rule comes from request extensions (set by [`with_rule`]) and
/// defaults to `general`.
///
/// # Usage
///
/// ```ignore
/// Router::new()
///     .route("/login", post(login_handler))
///     .layer(from_fn_with_state(state.clone(), rate_limit_by_ip))
///     .layer(from_fn(with_rule(RuleType::Login)))
/// ```
///
/// # Behavior
///
/// - Stores `NormalizedIp` in request extensions for downstream handlers.
/// - If the limit is exceeded or a block is active, returns
///   `429 Too Many Requests` with `Retry-After`.
/// - If the store is unavailable, the limiter's `fail_open` setting decides
///   between passing the request through and `503`.
#[tracing::instrument(skip(state, request, next))]
pub async fn rate_limit_by_ip(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let rule = request
        .extensions()
        .get::<RuleType>()
        .cloned()
        .unwrap_or(RuleType::General);

    let trust_proxy = state.rate_limiter.config().trust_proxy;
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = ClientIp::resolve(request.headers(), peer, trust_proxy);
    let normalized_ip = client.identifier();

    request
        .extensions_mut()
        .insert(NormalizedIp(normalized_ip.clone()));

    let result = state
        .rate_limiter
        .check_rate_limit(&normalized_ip, &rule, None)
        .await?;

    if !result.allowed {
        debug!(
            rule = %rule,
            ip = %normalized_ip,
            source = client.source.as_str(),
            blocked = result.blocked,
            "Rate limit exceeded"
        );
        return Err(RateLimitError::LimitExceeded(result));
    }

    Ok(next.run(request).await)
}

/// Sets the rate limit rule for downstream middleware.
///
/// Apply as the outer layer, after `rate_limit_by_ip` in builder order.
///
/// ```ignore
/// let app = Router::new()
///     .route("/login", post(login_handler))
///     .layer(from_fn_with_state(state.clone(), rate_limit_by_ip))
///     .layer(from_fn(with_rule(RuleType::Login)));
/// ```
pub fn with_rule(
    rule: RuleType,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>>
       + Clone
       + Send
       + 'static {
    move |mut request: Request, next: Next| {
        request.extensions_mut().insert(rule.clone());
        Box::pin(async move { next.run(request).await })
    }
}
