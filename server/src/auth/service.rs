//! Token Service
//!
//! Issues access/refresh pairs, verifies presented tokens, and tracks
//! revoked sessions in the shared cache.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;
use warden_common::{ClaimSet, TokenPair, TokenPayload, TokenType};
use zeroize::Zeroizing;

use super::error::{AuthError, AuthResult};
use super::jwt::{TokenError, TokenKeys, MIN_SECRET_LEN};
use crate::cache::{CacheError, CacheStore};

/// Default cache key prefix for session state.
pub const DEFAULT_AUTH_KEY_PREFIX: &str = "warden:auth";

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Invalid token configuration. Fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenConfigError {
    #[error("JWT secret must be at least 32 bytes (got {0})")]
    SecretTooShort(usize),

    #[error("Token lifetimes must be positive")]
    NonPositiveTtl,

    #[error("Token lifetime {0}s exceeds the {max}s ceiling", max = MAX_TOKEN_TTL_SECS)]
    TtlTooLarge(i64),

    #[error("Refresh lifetime ({refresh}s) must exceed access lifetime ({access}s)")]
    RefreshNotLonger { access: i64, refresh: i64 },
}

/// Signing secret and token lifetimes.
#[derive(Clone)]
pub struct TokenConfig {
    secret: Zeroizing<String>,
    /// Access token lifetime in seconds.
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_ttl_secs: i64,
    /// Prefix for revocation keys.
    pub key_prefix: String,
}

impl TokenConfig {
    /// Validates and builds a token configuration.
    pub fn new(
        secret: impl Into<String>,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Result<Self, TokenConfigError> {
        let secret = Zeroizing::new(secret.into());
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenConfigError::SecretTooShort(secret.len()));
        }
        if access_ttl_secs <= 0 || refresh_ttl_secs <= 0 {
            return Err(TokenConfigError::NonPositiveTtl);
        }
        if let Some(ttl) = [access_ttl_secs, refresh_ttl_secs]
            .into_iter()
            .find(|ttl| *ttl > MAX_TOKEN_TTL_SECS)
        {
            return Err(TokenConfigError::TtlTooLarge(ttl));
        }
        if refresh_ttl_secs <= access_ttl_secs {
            return Err(TokenConfigError::RefreshNotLonger {
                access: access_ttl_secs,
                refresh: refresh_ttl_secs,
            });
        }

        Ok(Self {
            secret,
            access_ttl_secs,
            refresh_ttl_secs,
            key_prefix: DEFAULT_AUTH_KEY_PREFIX.to_string(),
        })
    }

    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

/// Issues and verifies session tokens.
pub struct TokenService {
    keys: TokenKeys,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    key_prefix: String,
    cache: Arc<dyn CacheStore>,
}

impl TokenService {
    pub fn new(config: TokenConfig, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            keys: TokenKeys::from_secret(config.secret.as_bytes()),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
            key_prefix: config.key_prefix,
            cache,
        }
    }

    /// Issue an access/refresh pair sharing one fresh session id and `iat`.
    pub fn create_token_pair(&self, claims: &ClaimSet) -> AuthResult<TokenPair> {
        self.issue(claims, Utc::now().timestamp())
    }

    fn issue(&self, claims: &ClaimSet, now: i64) -> AuthResult<TokenPair> {
        let session_id = Uuid::now_v7().to_string();
        let payload = |token_type: TokenType, ttl: i64| -> AuthResult<TokenPayload> {
            Ok(TokenPayload {
                user_id: claims.id.clone(),
                email: claims.email.clone(),
                roles: claims.roles.clone(),
                session_id: session_id.clone(),
                token_type,
                iat: now,
                exp: now.checked_add(ttl).ok_or(AuthError::ExpiryOverflow)?,
            })
        };

        let access_token = self
            .keys
            .sign(&payload(TokenType::Access, self.access_ttl_secs)?)?;
        let refresh_token = self
            .keys
            .sign(&payload(TokenType::Refresh, self.refresh_ttl_secs)?)?;

        debug!(user_id = %claims.id, session_id = %session_id, "Issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl_secs,
            refresh_expires_in: self.refresh_ttl_secs,
        })
    }

    /// Verify a token of either type. Pure; no cache access.
    pub fn verify_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.keys.verify(token).inspect_err(|e| {
            debug!(kind = e.kind(), "Token verification failed");
        })
    }

    /// Verify an access token and reject revoked sessions.
    pub async fn authenticate(&self, token: &str) -> AuthResult<TokenPayload> {
        let payload = self.verify_expecting(token, TokenType::Access)?;
        self.ensure_not_revoked(&payload).await?;
        Ok(payload)
    }

    /// Exchange a refresh token for a new pair. The old session is revoked.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let payload = self.verify_expecting(refresh_token, TokenType::Refresh)?;
        self.ensure_not_revoked(&payload).await?;
        self.revoke_session(&payload.session_id, payload.iat).await?;

        self.create_token_pair(&payload.claims())
    }

    /// Mark a session revoked for as long as its refresh token could live.
    ///
    /// `issued_at` is the session's shared `iat`.
    pub async fn revoke_session(&self, session_id: &str, issued_at: i64) -> Result<(), CacheError> {
        let now = Utc::now().timestamp();
        let ttl = issued_at
            .saturating_add(self.refresh_ttl_secs)
            .saturating_sub(now)
            .clamp(1, self.refresh_ttl_secs);

        self.cache
            .set(
                &self.revocation_key(session_id),
                &now.to_string(),
                Duration::from_secs(ttl as u64),
            )
            .await?;

        info!(session_id = %session_id, ttl_secs = ttl, "Session revoked");
        Ok(())
    }

    pub async fn is_session_revoked(&self, session_id: &str) -> Result<bool, CacheError> {
        Ok(self
            .cache
            .get(&self.revocation_key(session_id))
            .await?
            .is_some())
    }

    fn verify_expecting(&self, token: &str, expected: TokenType) -> AuthResult<TokenPayload> {
        let payload = self.verify_token(token)?;
        if payload.token_type != expected {
            debug!(
                expected = expected.as_str(),
                got = payload.token_type.as_str(),
                "Token type mismatch"
            );
            return Err(AuthError::WrongTokenType { expected });
        }
        Ok(payload)
    }

    async fn ensure_not_revoked(&self, payload: &TokenPayload) -> AuthResult<()> {
        if self.is_session_revoked(&payload.session_id).await? {
            debug!(session_id = %payload.session_id, "Rejected revoked session");
            return Err(AuthError::SessionRevoked);
        }
        Ok(())
    }

    fn revocation_key(&self, session_id: &str) -> String {
        format!("{}:revoked:{}", self.key_prefix, session_id)
    }
}
