//! Cache store abstraction shared by the token service and the rate limiter.
//!
//! Both services only ever talk to the cache through [`CacheStore`]. The
//! sliding-window primitives live on the trait so that each backend can make
//! the read-filter-append-write sequence atomic on its own terms.

mod error;
mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use error::CacheError;
pub use memory::MemoryStore;
pub use redis::{create_redis_client, RedisStore};

/// Outcome of an atomic sliding-window admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAdmission {
    /// Whether the timestamp was appended to the window.
    pub admitted: bool,
    /// Window state after the call.
    pub state: WindowState,
}

/// Snapshot of a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowState {
    /// Timestamps newer than `now - window_ms`.
    pub count: u32,
    /// Oldest timestamp still inside the window (epoch ms).
    pub oldest_ms: Option<i64>,
}

/// TTL key-value store with sliding-window support.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the value stored under `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Removes `key`. Returns `true` if a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Lists live keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError>;

    /// Atomically prunes timestamps `<= now_ms - window_ms`, then appends
    /// `now_ms` if fewer than `limit` remain. The key TTL is refreshed on
    /// admission to `window_ms` rounded up to whole seconds.
    async fn window_admit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
        limit: u32,
    ) -> Result<WindowAdmission, CacheError>;

    /// Read-only view of the window at `now_ms`.
    async fn window_peek(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
    ) -> Result<WindowState, CacheError>;
}

/// Key TTL for a window record: `window_ms` rounded up to whole seconds.
pub(crate) const fn window_ttl(window_ms: u64) -> Duration {
    Duration::from_secs(window_ms.div_ceil(1000))
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
