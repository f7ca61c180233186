//! Rate limiting constants.

use warden_common::RateLimitRule;

/// Cache key pre-allocation size
pub const KEY_CAPACITY: usize = 64;

/// IPv6 clients are keyed by network prefix of this length
pub const IPV6_PREFIX_BITS: u32 = 64;

/// Default cache key prefix
pub const DEFAULT_KEY_PREFIX: &str = "warden:rl";

/// Key segment for sliding-window records
pub const WINDOW_SEGMENT: &str = "window";

/// Key segment for block records
pub const BLOCK_SEGMENT: &str = "block";

/// Quota of the `general` rule, also the fallback for unknown rule names
pub const GENERAL_RULE: RateLimitRule = RateLimitRule::new(100, 60_000, Some(300_000));
