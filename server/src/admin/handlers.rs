//! Rate limit admin handlers.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use warden_common::RateLimitRule;

use crate::api::AppState;
use crate::auth::AuthSession;
use crate::ratelimit::{RateLimitError, RateLimitResult, RateLimitStats, RuleType};

/// Identifier status under one rule.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub rule: RuleType,
    pub identifier: String,
    pub status: RateLimitResult,
}

/// Outcome of a reset.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

/// GET /admin/ratelimit/rules
pub async fn get_rules(State(state): State<AppState>) -> Json<BTreeMap<String, RateLimitRule>> {
    Json(state.rate_limiter.get_rules(None))
}

/// GET /admin/ratelimit/stats
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<RateLimitStats>, RateLimitError> {
    Ok(Json(state.rate_limiter.get_rate_limit_stats().await?))
}

/// GET /admin/ratelimit/{rule}/{identifier}
pub async fn get_status(
    State(state): State<AppState>,
    Path((rule, identifier)): Path<(String, String)>,
) -> Result<Json<StatusResponse>, RateLimitError> {
    let rule = RuleType::from(rule);
    let status = state
        .rate_limiter
        .get_rate_limit_status(&identifier, &rule)
        .await?;

    Ok(Json(StatusResponse {
        rule,
        identifier,
        status,
    }))
}

/// DELETE /admin/ratelimit/{rule}/{identifier}
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.user_id))]
pub async fn clear(
    State(state): State<AppState>,
    admin: AuthSession,
    Path((rule, identifier)): Path<(String, String)>,
) -> Result<Json<ClearResponse>, RateLimitError> {
    let cleared = state
        .rate_limiter
        .clear_rate_limit(&identifier, &RuleType::from(rule))
        .await?;

    Ok(Json(ClearResponse { cleared }))
}
