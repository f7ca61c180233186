//! Rate limiting configuration.

use std::collections::{BTreeMap, HashSet};

use warden_common::RateLimitRule;

use crate::ratelimit::{RuleType, DEFAULT_KEY_PREFIX};

/// Configuration for the rate limiting system.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Prefix for cache keys (e.g., "warden:rl")
    pub key_prefix: String,
    /// Whether to allow requests when the cache store is unavailable
    pub fail_open: bool,
    /// Whether to trust X-Forwarded-For headers
    pub trust_proxy: bool,
    /// Identifiers that bypass rate limiting
    pub allowlist: HashSet<String>,
    /// Rule table keyed by rule name
    pub rules: BTreeMap<String, RateLimitRule>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            fail_open: true,
            trust_proxy: false,
            allowlist: HashSet::new(),
            rules: default_rules(),
        }
    }
}

/// Built-in rule table.
pub fn default_rules() -> BTreeMap<String, RateLimitRule> {
    RuleType::builtins()
        .into_iter()
        .filter_map(|rule| {
            rule.default_rule()
                .map(|limits| (rule.as_str().to_string(), limits))
        })
        .collect()
}

impl RateLimitConfig {
    /// Creates configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RATE_LIMIT_ENABLED`: Enable/disable rate limiting (default: true)
    /// - `RATE_LIMIT_PREFIX`: Cache key prefix (default: "warden:rl")
    /// - `RATE_LIMIT_FAIL_OPEN`: Allow requests when the store is unavailable (default: true)
    /// - `RATE_LIMIT_TRUST_PROXY`: Trust X-Forwarded-For headers (default: false)
    /// - `RATE_LIMIT_ALLOWLIST`: Comma-separated identifier allowlist
    /// - `RATE_LIMIT_<RULE>`: Per-rule override as "requests,window_ms[,block_ms]",
    ///   e.g. `RATE_LIMIT_LOGIN=5,900000,1800000`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RATE_LIMIT_ENABLED") {
            config.enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_PREFIX") {
            config.key_prefix = val;
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_FAIL_OPEN") {
            config.fail_open = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_TRUST_PROXY") {
            config.trust_proxy = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_ALLOWLIST") {
            config.allowlist = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        for rule in RuleType::builtins() {
            let var = format!("RATE_LIMIT_{}", rule.as_str().to_uppercase());
            let Ok(val) = std::env::var(&var) else {
                continue;
            };
            match parse_rule(&val) {
                Some(limits) => {
                    config.rules.insert(rule.as_str().to_string(), limits);
                }
                None => tracing::warn!(var = %var, value = %val, "Ignoring invalid rate limit rule"),
            }
        }

        config
    }

    /// Configured quota for a rule name.
    pub fn rule(&self, rule_type: &RuleType) -> Option<RateLimitRule> {
        self.rules.get(rule_type.as_str()).copied()
    }
}

/// Parses a rule from "requests,window_ms" or "requests,window_ms,block_ms" format.
pub fn parse_rule(val: &str) -> Option<RateLimitRule> {
    let parts: Vec<&str> = val.split(',').map(str::trim).collect();
    let rule = match parts.as_slice() {
        [requests, window_ms] => RateLimitRule::new(requests.parse().ok()?, window_ms.parse().ok()?, None),
        [requests, window_ms, block_ms] => RateLimitRule::new(
            requests.parse().ok()?,
            window_ms.parse().ok()?,
            Some(block_ms.parse().ok()?),
        ),
        _ => return None,
    };
    rule.is_valid().then_some(rule)
}
