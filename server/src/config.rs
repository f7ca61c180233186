//! Server Configuration
//!
//! Loads configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::auth::{TokenConfig, DEFAULT_AUTH_KEY_PREFIX};
use crate::ratelimit::RateLimitConfig;

/// Where session and rate limit state is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    /// Shared Redis instance
    #[default]
    Redis,
    /// Process-local store; state is lost on restart and not shared
    Memory,
}

impl CacheBackend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown cache backend {other:?} (expected redis or memory)"),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// Redis connection URL
    pub redis_url: String,

    /// Cache backend (default: redis)
    pub cache_backend: CacheBackend,

    /// JWT secret and token lifetimes
    pub token: TokenConfig,

    /// Rate limiting
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `BIND_ADDRESS` (default: "0.0.0.0:8080")
    /// - `REDIS_URL` (default: "redis://localhost:6379")
    /// - `CACHE_BACKEND`: "redis" or "memory" (default: redis)
    /// - `JWT_SECRET`: required, at least 32 bytes
    /// - `JWT_ACCESS_EXPIRY`: seconds (default: 900 = 15 min)
    /// - `JWT_REFRESH_EXPIRY`: seconds (default: 604800 = 7 days)
    /// - `AUTH_KEY_PREFIX` (default: "warden:auth")
    /// - `RATE_LIMIT_*`: see [`RateLimitConfig::from_env`]
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_access_expiry = parse_var("JWT_ACCESS_EXPIRY", 900)?;
        let jwt_refresh_expiry = parse_var("JWT_REFRESH_EXPIRY", 604800)?;

        let token = TokenConfig::new(jwt_secret, jwt_access_expiry, jwt_refresh_expiry)
            .context("Invalid token configuration")?
            .with_key_prefix(
                env::var("AUTH_KEY_PREFIX").unwrap_or_else(|_| DEFAULT_AUTH_KEY_PREFIX.into()),
            );

        let cache_backend = match env::var("CACHE_BACKEND") {
            Ok(val) => val.parse().context("Invalid CACHE_BACKEND")?,
            Err(_) => CacheBackend::default(),
        };

        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into()),
            cache_backend,
            token,
            rate_limit: RateLimitConfig::from_env(),
        })
    }

    /// Create a default configuration for testing.
    ///
    /// Uses the in-memory cache backend. For the Redis-backed tests:
    /// `docker run -d --name warden-test-redis -p 6380:6379 redis:7`
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            redis_url: "redis://localhost:6380".into(),
            cache_backend: CacheBackend::Memory,
            token: TokenConfig::new("test-secret-that-is-at-least-32-bytes!", 900, 604800)
                .expect("test secret is long enough")
                .with_key_prefix("test:auth"),
            rate_limit: RateLimitConfig {
                key_prefix: "test:rl".into(),
                ..RateLimitConfig::default()
            },
        }
    }
}

/// Reads an integer variable, falling back to `default` when unset.
fn parse_var(name: &str, default: i64) -> Result<i64> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .with_context(|| format!("{name} must be an integer (got {val:?})")),
        Err(_) => Ok(default),
    }
}
