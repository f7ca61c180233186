//! Authentication Middleware

use std::collections::BTreeSet;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use warden_common::TokenPayload;

use super::error::AuthError;
use crate::api::AppState;

/// Role required by administrative routes.
pub const ADMIN_ROLE: &str = "admin";

/// Verified session injected into request extensions.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// User ID.
    pub user_id: String,
    /// Email.
    pub email: String,
    /// Roles carried by the token.
    pub roles: BTreeSet<String>,
    /// Session the token belongs to.
    pub session_id: String,
    /// Session issue time (Unix seconds).
    pub issued_at: i64,
    /// Access token expiry (Unix seconds).
    pub expires_at: i64,
}

impl AuthSession {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl From<TokenPayload> for AuthSession {
    fn from(payload: TokenPayload) -> Self {
        Self {
            user_id: payload.user_id,
            email: payload.email,
            roles: payload.roles,
            session_id: payload.session_id,
            issued_at: payload.iat,
            expires_at: payload.exp,
        }
    }
}

/// Extract the bearer token from an Authorization header value.
fn bearer_token(request: &Request) -> Result<&str, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Middleware to require authentication.
///
/// Extracts the Bearer token, verifies it as an access token for a live
/// session, and injects `AuthSession` into request extensions.
///
/// # Usage
///
/// ```ignore
/// Router::new()
///     .route("/protected", get(handler))
///     .layer(axum::middleware::from_fn_with_state(state, require_auth))
/// ```
#[tracing::instrument(skip(state, request, next))]
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&request)?.to_owned();
    let payload = state.tokens.authenticate(&token).await?;

    request.extensions_mut().insert(AuthSession::from(payload));

    Ok(next.run(request).await)
}

/// Middleware that requires the `admin` role. Apply after `require_auth`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AuthError> {
    let session = request
        .extensions()
        .get::<AuthSession>()
        .ok_or(AuthError::MissingAuthHeader)?;

    if !session.has_role(ADMIN_ROLE) {
        tracing::debug!(user_id = %session.user_id, "Admin role required");
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(request).await)
}

/// Extractor for the authenticated session in handlers.
///
/// ```ignore
/// async fn handler(session: AuthSession) -> impl IntoResponse {
///     session.user_id
/// }
/// ```
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}
