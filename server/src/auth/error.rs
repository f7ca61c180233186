//! Authentication Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use warden_common::TokenType;

use super::jwt::TokenError;
use crate::cache::CacheError;

/// Authentication error types.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing Authorization header.
    #[error("Missing authorization header")]
    MissingAuthHeader,

    /// Invalid authorization header format.
    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    /// Token failed verification. The kind is logged, never returned.
    #[error("Invalid or expired token")]
    InvalidToken(#[from] TokenError),

    /// A refresh token was presented where an access token is required, or
    /// the other way round.
    #[error("Invalid or expired token")]
    WrongTokenType { expected: TokenType },

    /// The session was revoked (logout or refresh rotation).
    #[error("Session revoked")]
    SessionRevoked,

    /// Authenticated, but missing a required role.
    #[error("Insufficient role")]
    Forbidden,

    /// Cache unavailable while checking revocation.
    #[error("Session store unavailable")]
    Store(#[from] CacheError),

    /// `iat + ttl` does not fit in a timestamp.
    #[error("Token expiry out of range")]
    ExpiryOverflow,

    /// Token encoding failed.
    #[error("Token error")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Error response body for JSON responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::MissingAuthHeader => (StatusCode::UNAUTHORIZED, "MISSING_AUTH"),
            Self::InvalidAuthHeader => (StatusCode::UNAUTHORIZED, "INVALID_AUTH_HEADER"),
            Self::InvalidToken(_) | Self::WrongTokenType { .. } => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN")
            }
            Self::SessionRevoked => (StatusCode::UNAUTHORIZED, "SESSION_REVOKED"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::ExpiryOverflow | Self::Jwt(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
