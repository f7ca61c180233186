//! Rate limiting types.

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_common::RateLimitRule;

use crate::ratelimit::GENERAL_RULE;

/// Named rule a request is checked against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleType {
    /// Default quota for ordinary API traffic
    General,
    /// Login attempts
    Login,
    /// Registration attempts
    Register,
    /// Password reset requests
    PasswordReset,
    /// Chat messages
    Chat,
    /// Search queries
    Search,
    /// Caller-defined rule name
    Custom(String),
}

impl RuleType {
    /// Returns the string identifier for this rule (used in cache keys).
    pub fn as_str(&self) -> &str {
        match self {
            Self::General => "general",
            Self::Login => "login",
            Self::Register => "register",
            Self::PasswordReset => "password_reset",
            Self::Chat => "chat",
            Self::Search => "search",
            Self::Custom(name) => name,
        }
    }

    /// Returns the built-in rules.
    pub fn builtins() -> [Self; 6] {
        [
            Self::General,
            Self::Login,
            Self::Register,
            Self::PasswordReset,
            Self::Chat,
            Self::Search,
        ]
    }

    /// Default quota for a built-in rule. Custom names have none.
    pub const fn default_rule(&self) -> Option<RateLimitRule> {
        let rule = match self {
            Self::General => GENERAL_RULE,
            Self::Login => RateLimitRule::new(5, 900_000, Some(1_800_000)),
            Self::Register => RateLimitRule::new(3, 3_600_000, Some(7_200_000)),
            Self::PasswordReset => RateLimitRule::new(3, 3_600_000, Some(3_600_000)),
            Self::Chat => RateLimitRule::new(50, 60_000, Some(600_000)),
            Self::Search => RateLimitRule::new(30, 60_000, Some(300_000)),
            Self::Custom(_) => return None,
        };
        Some(rule)
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for RuleType {
    fn from(name: &str) -> Self {
        match name {
            "general" => Self::General,
            "login" => Self::Login,
            "register" => Self::Register,
            "password_reset" => Self::PasswordReset,
            "chat" => Self::Chat,
            "search" => Self::Search,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for RuleType {
    fn from(name: String) -> Self {
        match Self::from(name.as_str()) {
            Self::Custom(_) => Self::Custom(name),
            builtin => builtin,
        }
    }
}

impl From<RuleType> for String {
    fn from(rule: RuleType) -> Self {
        match rule {
            RuleType::Custom(name) => name,
            builtin => builtin.as_str().to_string(),
        }
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Maximum requests allowed in the window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Epoch ms when another request will be admitted
    pub reset_time: i64,
    /// Whether an active block record refused the request
    pub blocked: bool,
    /// Epoch ms when the block expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_expires_at: Option<i64>,
}

impl RateLimitResult {
    /// Admission outside of any accounting (limiter disabled, allowlisted).
    pub const fn unmetered(rule: &RateLimitRule, now_ms: i64) -> Self {
        Self {
            allowed: true,
            limit: rule.requests,
            remaining: rule.requests,
            reset_time: now_ms.saturating_add(rule.window_ms as i64),
            blocked: false,
            block_expires_at: None,
        }
    }

    /// Refusal by an active block record.
    pub const fn blocked(rule: &RateLimitRule, expires_at: i64) -> Self {
        Self {
            allowed: false,
            limit: rule.requests,
            remaining: 0,
            reset_time: expires_at,
            blocked: true,
            block_expires_at: Some(expires_at),
        }
    }

    /// Whole seconds to wait before retrying (0 if allowed).
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        if self.allowed {
            return 0;
        }
        let wait_ms = self.block_expires_at.unwrap_or(self.reset_time) - now_ms;
        u64::try_from(wait_ms).map_or(1, |ms| ms.div_ceil(1000).max(1))
    }
}

/// Active window and block keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    pub window_key_count: usize,
    pub block_key_count: usize,
    pub window_keys: Vec<String>,
    pub block_keys: Vec<String>,
}

/// Normalized IP address stored in request extensions.
///
/// IPv4 addresses are stored as-is.
/// IPv6 addresses are normalized to /64 prefix for rate limiting.
#[derive(Debug, Clone)]
pub struct NormalizedIp(pub String);
