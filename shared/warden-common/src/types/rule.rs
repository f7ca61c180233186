//! Rate Limit Rule Types

use serde::{Deserialize, Serialize};

/// Longest accepted window or block duration: 30 days.
pub const MAX_RULE_DURATION_MS: u64 = 30 * 24 * 60 * 60 * 1000;

/// Quota applied to one identifier under one named rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRule {
    /// Maximum requests admitted within the window.
    pub requests: u32,
    /// Sliding window length in milliseconds.
    pub window_ms: u64,
    /// Block duration once the quota is exceeded. `None` denies at the
    /// boundary without escalating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_duration_ms: Option<u64>,
}

impl RateLimitRule {
    pub const fn new(requests: u32, window_ms: u64, block_duration_ms: Option<u64>) -> Self {
        Self {
            requests,
            window_ms,
            block_duration_ms,
        }
    }

    /// Window TTL for the cache record, rounded up to whole seconds.
    pub const fn window_ttl_secs(&self) -> u64 {
        self.window_ms.div_ceil(1000)
    }

    /// A rule must admit at least one request over a non-empty window.
    /// Window and block durations are capped at [`MAX_RULE_DURATION_MS`].
    pub const fn is_valid(&self) -> bool {
        let block_ok = match self.block_duration_ms {
            Some(block_ms) => block_ms > 0 && block_ms <= MAX_RULE_DURATION_MS,
            None => true,
        };
        self.requests > 0
            && self.window_ms > 0
            && self.window_ms <= MAX_RULE_DURATION_MS
            && block_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_ttl_rounds_up() {
        assert_eq!(RateLimitRule::new(1, 60_000, None).window_ttl_secs(), 60);
        assert_eq!(RateLimitRule::new(1, 1, None).window_ttl_secs(), 1);
        assert_eq!(RateLimitRule::new(1, 1_500, None).window_ttl_secs(), 2);
    }

    #[test]
    fn block_duration_is_optional_on_the_wire() {
        let rule: RateLimitRule =
            serde_json::from_str(r#"{"requests":5,"windowMs":900000}"#).unwrap();
        assert_eq!(rule.block_duration_ms, None);

        let json = serde_json::to_string(&RateLimitRule::new(5, 900_000, Some(1_800_000))).unwrap();
        assert!(json.contains("\"blockDurationMs\":1800000"));
    }

    #[test]
    fn zero_quota_is_invalid() {
        assert!(!RateLimitRule::new(0, 1_000, None).is_valid());
        assert!(!RateLimitRule::new(1, 0, None).is_valid());
        assert!(RateLimitRule::new(1, 1, None).is_valid());
    }

    #[test]
    fn durations_are_capped() {
        assert!(RateLimitRule::new(1, MAX_RULE_DURATION_MS, Some(MAX_RULE_DURATION_MS)).is_valid());
        assert!(!RateLimitRule::new(1, MAX_RULE_DURATION_MS + 1, None).is_valid());
        assert!(!RateLimitRule::new(1, u64::MAX, None).is_valid());
        assert!(!RateLimitRule::new(1, 1_000, Some(u64::MAX)).is_valid());
        assert!(!RateLimitRule::new(1, 1_000, Some(0)).is_valid());
    }
}
