//! Session HTTP Handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use warden_common::TokenPair;

use super::error::AuthResult;
use super::middleware::AuthSession;
use crate::api::AppState;

/// Refresh request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Current session view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
    pub roles: Vec<String>,
    pub session_id: String,
    pub expires_at: i64,
}

/// POST /auth/refresh
#[tracing::instrument(skip(state, body))]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AuthResult<Json<TokenPair>> {
    let pair = state.tokens.refresh(&body.refresh_token).await?;
    Ok(Json(pair))
}

/// POST /auth/logout
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn logout(
    State(state): State<AppState>,
    session: AuthSession,
) -> AuthResult<StatusCode> {
    state
        .tokens
        .revoke_session(&session.session_id, session.issued_at)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/session
pub async fn get_session(session: AuthSession) -> Json<SessionResponse> {
    Json(SessionResponse {
        user_id: session.user_id,
        email: session.email,
        roles: session.roles.into_iter().collect(),
        session_id: session.session_id,
        expires_at: session.expires_at,
    })
}
