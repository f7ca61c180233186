//! Rate limiting error types for HTTP responses.

use axum::http::header::{HeaderValue, RETRY_AFTER};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::cache::now_ms;
use crate::ratelimit::RateLimitResult;

/// Errors that can occur during rate limit checks.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Cache store unreachable and the limiter is configured to fail closed.
    #[error("Rate limit store unavailable")]
    StoreUnavailable,
    /// Request exceeded the rate limit or hit an active block.
    #[error("Too many requests")]
    LimitExceeded(RateLimitResult),
}

/// JSON response body for rate limit errors.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitErrorResponse {
    /// Error code identifier.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Seconds to wait before retrying.
    pub retry_after: u64,
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Remaining requests (always 0 when rate limited).
    pub remaining: u32,
    /// Whether a block record refused the request.
    pub blocked: bool,
    /// Epoch ms when the block expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_expires_at: Option<i64>,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        match self {
            Self::StoreUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "error": "service_unavailable",
                    "message": "Rate limit store unavailable",
                })),
            )
                .into_response(),
            Self::LimitExceeded(result) => {
                let retry_after = result.retry_after_secs(now_ms());
                let (error, message) = if result.blocked {
                    ("blocked", format!("Temporarily blocked. Wait {retry_after} seconds."))
                } else {
                    ("rate_limited", format!("Too many requests. Wait {retry_after} seconds."))
                };
                let body = RateLimitErrorResponse {
                    error,
                    message,
                    retry_after,
                    limit: result.limit,
                    remaining: 0,
                    blocked: result.blocked,
                    block_expires_at: result.block_expires_at,
                };
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(RETRY_AFTER, v);
                }
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_common::RateLimitRule;

    #[test]
    fn test_blocked_response_carries_retry_after() {
        let rule = RateLimitRule::new(5, 900_000, Some(1_800_000));
        let result = RateLimitResult::blocked(&rule, now_ms() + 1_800_000);
        let response = RateLimitError::LimitExceeded(result).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap();
        assert!((1_799..=1_800).contains(&retry_after));
    }

    #[test]
    fn test_store_unavailable_is_503() {
        let response = RateLimitError::StoreUnavailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
