//! Core rate limiter service.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use warden_common::RateLimitRule;

use crate::cache::{now_ms, CacheError, CacheStore};
use crate::ratelimit::{
    RateLimitConfig, RateLimitError, RateLimitResult, RateLimitStats, RuleType, BLOCK_SEGMENT,
    GENERAL_RULE, KEY_CAPACITY, WINDOW_SEGMENT,
};

/// Sliding-window rate limiter with block escalation.
///
/// Admission runs through [`CacheStore::window_admit`], so the quota holds
/// under concurrent requests for the same identifier. Block records live
/// next to the window records and take precedence over them.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    config: Arc<RateLimitConfig>,
}

impl RateLimiter {
    /// Creates a new rate limiter over the given store.
    pub fn new(store: Arc<dyn CacheStore>, config: RateLimitConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Checks and records a request for `identifier` under `rule_type`.
    ///
    /// `custom_rule` overrides the configured quota for this call only.
    ///
    /// # Errors
    /// Returns `RateLimitError::StoreUnavailable` if the store is unreachable
    /// and `fail_open` is off. With `fail_open` on, store failures admit the
    /// request.
    #[tracing::instrument(skip(self, custom_rule), fields(rule = %rule_type))]
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        rule_type: &RuleType,
        custom_rule: Option<RateLimitRule>,
    ) -> Result<RateLimitResult, RateLimitError> {
        let rule = self.resolve_rule(rule_type, custom_rule);
        let now = now_ms();

        if !self.config.enabled {
            return Ok(RateLimitResult::unmetered(&rule, now));
        }

        if self.is_allowed_by_config(identifier) {
            debug!(identifier = %identifier, "Identifier in allowlist, bypassing rate limit");
            return Ok(RateLimitResult::unmetered(&rule, now));
        }

        match self.admit(identifier, rule_type, &rule, now).await {
            Ok(result) => Ok(result),
            Err(e) if self.config.fail_open => {
                warn!(
                    error = %e,
                    identifier = %identifier,
                    "Rate limit store unavailable, allowing request (fail_open=true)"
                );
                Ok(RateLimitResult::unmetered(&rule, now))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    identifier = %identifier,
                    "Rate limit store unavailable, rejecting request (fail_open=false)"
                );
                Err(RateLimitError::StoreUnavailable)
            }
        }
    }

    async fn admit(
        &self,
        identifier: &str,
        rule_type: &RuleType,
        rule: &RateLimitRule,
        now: i64,
    ) -> Result<RateLimitResult, CacheError> {
        let block_key = self.build_key(BLOCK_SEGMENT, rule_type, identifier);
        if let Some(expires_at) = self.active_block(&block_key, now).await? {
            debug!(identifier = %identifier, block_expires_at = expires_at, "Identifier is blocked");
            return Ok(RateLimitResult::blocked(rule, expires_at));
        }

        let window_key = self.build_key(WINDOW_SEGMENT, rule_type, identifier);
        let admission = self
            .store
            .window_admit(&window_key, now, rule.window_ms, rule.requests)
            .await?;
        let window = rule.window_ms as i64;

        if admission.admitted {
            return Ok(RateLimitResult {
                allowed: true,
                limit: rule.requests,
                remaining: rule.requests.saturating_sub(admission.state.count),
                reset_time: now.saturating_add(window),
                blocked: false,
                block_expires_at: None,
            });
        }

        if let Some(block_ms) = rule.block_duration_ms {
            let expires_at = now.saturating_add(block_ms as i64);
            self.store
                .set(
                    &block_key,
                    &expires_at.to_string(),
                    Duration::from_millis(block_ms),
                )
                .await?;
            info!(
                identifier = %identifier,
                block_ms = block_ms,
                "Rate limit exceeded, identifier blocked"
            );
            return Ok(RateLimitResult::blocked(rule, expires_at));
        }

        debug!(identifier = %identifier, count = admission.state.count, "Rate limit exceeded");
        Ok(RateLimitResult {
            allowed: false,
            limit: rule.requests,
            remaining: 0,
            reset_time: admission.state.oldest_ms.unwrap_or(now).saturating_add(window),
            blocked: false,
            block_expires_at: None,
        })
    }

    /// Reports what `check_rate_limit` would decide, without recording anything.
    ///
    /// # Errors
    /// Returns `RateLimitError::StoreUnavailable` if the store is unreachable.
    #[tracing::instrument(skip(self), fields(rule = %rule_type))]
    pub async fn get_rate_limit_status(
        &self,
        identifier: &str,
        rule_type: &RuleType,
    ) -> Result<RateLimitResult, RateLimitError> {
        let rule = self.resolve_rule(rule_type, None);
        let now = now_ms();

        let block_key = self.build_key(BLOCK_SEGMENT, rule_type, identifier);
        if let Some(expires_at) = self
            .active_block(&block_key, now)
            .await
            .map_err(store_unavailable)?
        {
            return Ok(RateLimitResult::blocked(&rule, expires_at));
        }

        let window_key = self.build_key(WINDOW_SEGMENT, rule_type, identifier);
        let state = self
            .store
            .window_peek(&window_key, now, rule.window_ms)
            .await
            .map_err(store_unavailable)?;

        Ok(RateLimitResult {
            allowed: state.count < rule.requests,
            limit: rule.requests,
            remaining: rule.requests.saturating_sub(state.count),
            reset_time: state
                .oldest_ms
                .unwrap_or(now)
                .saturating_add(rule.window_ms as i64),
            blocked: false,
            block_expires_at: None,
        })
    }

    /// Deletes the window and block records for an identifier.
    ///
    /// Returns `true` if either record existed.
    #[tracing::instrument(skip(self), fields(rule = %rule_type))]
    pub async fn clear_rate_limit(
        &self,
        identifier: &str,
        rule_type: &RuleType,
    ) -> Result<bool, RateLimitError> {
        let window_key = self.build_key(WINDOW_SEGMENT, rule_type, identifier);
        let block_key = self.build_key(BLOCK_SEGMENT, rule_type, identifier);

        let window = self
            .store
            .delete(&window_key)
            .await
            .map_err(store_unavailable)?;
        let block = self
            .store
            .delete(&block_key)
            .await
            .map_err(store_unavailable)?;

        let cleared = window || block;
        info!(identifier = %identifier, cleared = cleared, "Rate limit state cleared");
        Ok(cleared)
    }

    /// Enumerates active window and block keys.
    ///
    /// Scans the whole key prefix; meant for operational tooling, not for
    /// request paths.
    #[tracing::instrument(skip(self))]
    pub async fn get_rate_limit_stats(&self) -> Result<RateLimitStats, RateLimitError> {
        let window_prefix = format!("{}:{WINDOW_SEGMENT}:", self.config.key_prefix);
        let block_prefix = format!("{}:{BLOCK_SEGMENT}:", self.config.key_prefix);

        let window_keys = self
            .store
            .keys_with_prefix(&window_prefix)
            .await
            .map_err(store_unavailable)?;
        let block_keys = self
            .store
            .keys_with_prefix(&block_prefix)
            .await
            .map_err(store_unavailable)?;

        Ok(RateLimitStats {
            window_key_count: window_keys.len(),
            block_key_count: block_keys.len(),
            window_keys,
            block_keys,
        })
    }

    /// Returns the configured rule table, with `custom` merged in if given.
    pub fn get_rules(&self, custom: Option<(&str, RateLimitRule)>) -> BTreeMap<String, RateLimitRule> {
        let mut rules = self.config.rules.clone();
        if let Some((name, rule)) = custom {
            rules.insert(name.to_string(), rule);
        }
        rules
    }

    /// Resolves the effective quota: custom, then the named rule, then `general`.
    ///
    /// Rules failing [`RateLimitRule::is_valid`] are skipped, so the result
    /// always admits at least one request and has bounded durations.
    pub fn resolve_rule(
        &self,
        rule_type: &RuleType,
        custom_rule: Option<RateLimitRule>,
    ) -> RateLimitRule {
        let valid = |source: &'static str, rule: Option<RateLimitRule>| {
            rule.filter(|rule| {
                let ok = rule.is_valid();
                if !ok {
                    warn!(
                        rule = %rule_type,
                        source,
                        quota = ?rule,
                        "Ignoring invalid rate limit rule"
                    );
                }
                ok
            })
        };

        valid("custom", custom_rule)
            .or_else(|| valid("configured", self.config.rule(rule_type)))
            .or_else(|| valid("configured", self.config.rule(&RuleType::General)))
            .unwrap_or(GENERAL_RULE)
    }

    /// Checks if the identifier is in the allowlist configuration.
    pub fn is_allowed_by_config(&self, identifier: &str) -> bool {
        self.config.allowlist.contains(identifier)
    }

    /// Returns the configuration for this rate limiter.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Reads a block record, returning its expiry if still in the future.
    async fn active_block(&self, block_key: &str, now: i64) -> Result<Option<i64>, CacheError> {
        let Some(raw) = self.store.get(block_key).await? else {
            return Ok(None);
        };
        let expires_at: i64 = raw
            .parse()
            .map_err(|_| CacheError::Corrupt(format!("block record {block_key} holds {raw:?}")))?;
        Ok((expires_at > now).then_some(expires_at))
    }

    /// Builds a cache key: `{prefix}:{segment}:{rule}:{identifier}`.
    fn build_key(&self, segment: &str, rule_type: &RuleType, identifier: &str) -> String {
        let mut key = String::with_capacity(KEY_CAPACITY);
        key.push_str(&self.config.key_prefix);
        key.push(':');
        key.push_str(segment);
        key.push(':');
        key.push_str(rule_type.as_str());
        key.push(':');
        key.push_str(identifier);
        key
    }
}

fn store_unavailable(error: CacheError) -> RateLimitError {
    warn!(error = %error, "Rate limit store unavailable");
    RateLimitError::StoreUnavailable
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::cache::MemoryStore;

    fn mock_config() -> RateLimitConfig {
        RateLimitConfig {
            key_prefix: "test:rl".to_string(),
            allowlist: HashSet::from(["127.0.0.1".to_string()]),
            ..Default::default()
        }
    }

    fn create_limiter(config: RateLimitConfig) -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::new()), config)
    }

    #[test]
    fn test_build_key() {
        let limiter = create_limiter(mock_config());

        let key = limiter.build_key(WINDOW_SEGMENT, &RuleType::Login, "192.168.1.1");
        assert_eq!(key, "test:rl:window:login:192.168.1.1");

        let key = limiter.build_key(BLOCK_SEGMENT, &RuleType::from("upload"), "u1");
        assert_eq!(key, "test:rl:block:upload:u1");
    }

    #[test]
    fn test_resolve_rule_order() {
        let limiter = create_limiter(mock_config());
        let custom = RateLimitRule::new(2, 1_000, None);

        assert_eq!(limiter.resolve_rule(&RuleType::Login, Some(custom)), custom);
        assert_eq!(
            limiter.resolve_rule(&RuleType::Login, None),
            RateLimitRule::new(5, 900_000, Some(1_800_000))
        );
        assert_eq!(
            limiter.resolve_rule(&RuleType::from("unknown"), None),
            GENERAL_RULE
        );
    }

    #[test]
    fn test_invalid_rules_are_skipped() {
        let mut config = mock_config();
        config
            .rules
            .insert("search".to_string(), RateLimitRule::new(0, 60_000, None));
        let limiter = create_limiter(config);

        let upload = RuleType::from("upload");
        let zero_quota = RateLimitRule::new(0, 60_000, None);
        let endless_window = RateLimitRule::new(1, u64::MAX, None);
        let endless_block = RateLimitRule::new(1, 1_000, Some(u64::MAX));

        assert_eq!(
            limiter.resolve_rule(&RuleType::Login, Some(zero_quota)),
            RateLimitRule::new(5, 900_000, Some(1_800_000))
        );
        assert_eq!(limiter.resolve_rule(&upload, Some(endless_window)), GENERAL_RULE);
        assert_eq!(limiter.resolve_rule(&upload, Some(endless_block)), GENERAL_RULE);
        assert_eq!(limiter.resolve_rule(&RuleType::Search, None), GENERAL_RULE);
    }

    #[test]
    fn test_get_rules_merges_custom() {
        let limiter = create_limiter(mock_config());
        let custom = RateLimitRule::new(2, 1_000, None);

        assert_eq!(limiter.get_rules(None).len(), 6);
        let rules = limiter.get_rules(Some(("upload", custom)));
        assert_eq!(rules.len(), 7);
        assert_eq!(rules["upload"], custom);
        assert_eq!(limiter.get_rules(None).len(), 6);
    }

    #[tokio::test]
    async fn test_allowlist_bypasses_accounting() {
        let limiter = create_limiter(mock_config());
        let rule = RateLimitRule::new(1, 60_000, Some(60_000));

        for _ in 0..5 {
            let result = limiter
                .check_rate_limit("127.0.0.1", &RuleType::Login, Some(rule))
                .await
                .unwrap();
            assert!(result.allowed);
            assert_eq!(result.remaining, 1);
        }
        assert_eq!(limiter.get_rate_limit_stats().await.unwrap().window_key_count, 0);
    }

    #[tokio::test]
    async fn test_disabled_limiter_admits_everything() {
        let limiter = create_limiter(RateLimitConfig {
            enabled: false,
            ..mock_config()
        });
        let rule = RateLimitRule::new(1, 60_000, None);

        for _ in 0..3 {
            let result = limiter
                .check_rate_limit("10.0.0.1", &RuleType::General, Some(rule))
                .await
                .unwrap();
            assert!(result.allowed);
        }
    }

    #[tokio::test]
    async fn test_denial_without_block_duration() {
        let limiter = create_limiter(mock_config());
        let rule = RateLimitRule::new(2, 60_000, None);

        for _ in 0..2 {
            assert!(limiter
                .check_rate_limit("10.0.0.1", &RuleType::Chat, Some(rule))
                .await
                .unwrap()
                .allowed);
        }

        let denied = limiter
            .check_rate_limit("10.0.0.1", &RuleType::Chat, Some(rule))
            .await
            .unwrap();
        assert!(!denied.allowed);
        assert!(!denied.blocked);
        assert_eq!(denied.block_expires_at, None);
        assert_eq!(denied.remaining, 0);
        assert!(denied.reset_time <= now_ms() + 60_000);
        assert_eq!(limiter.get_rate_limit_stats().await.unwrap().block_key_count, 0);
    }

    #[tokio::test]
    async fn test_status_does_not_record() {
        let limiter = create_limiter(mock_config());

        limiter
            .check_rate_limit("10.0.0.1", &RuleType::Search, None)
            .await
            .unwrap();

        for _ in 0..3 {
            let status = limiter
                .get_rate_limit_status("10.0.0.1", &RuleType::Search)
                .await
                .unwrap();
            assert!(status.allowed);
            assert_eq!(status.remaining, 29);
        }
    }

    #[tokio::test]
    async fn test_rules_are_isolated() {
        let limiter = create_limiter(mock_config());
        let rule = RateLimitRule::new(1, 60_000, Some(60_000));

        limiter
            .check_rate_limit("10.0.0.1", &RuleType::Login, Some(rule))
            .await
            .unwrap();
        let blocked = limiter
            .check_rate_limit("10.0.0.1", &RuleType::Login, Some(rule))
            .await
            .unwrap();
        assert!(blocked.blocked);

        let other = limiter
            .check_rate_limit("10.0.0.1", &RuleType::Register, Some(rule))
            .await
            .unwrap();
        assert!(other.allowed);
    }
}
