//! In-process cache store.
//!
//! Backs single-node deployments and tests. Expiry is checked lazily on
//! access; expired entries are dropped when touched or listed.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{window_ttl, CacheError, CacheStore, WindowAdmission, WindowState};

#[derive(Debug)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Lock-sharded in-memory implementation of [`CacheStore`].
///
/// Window admission holds the shard write lock for its key for the whole
/// prune-count-append sequence, so concurrent callers are serialized.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<String, Expiring<String>>,
    windows: DashMap<String, Expiring<Vec<i64>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.values.retain(|_, entry| entry.is_live(now));
        self.windows.retain(|_, entry| entry.is_live(now));
    }
}

fn prune(timestamps: &mut Vec<i64>, now_ms: i64, window_ms: u64) {
    let bound = now_ms.saturating_sub(window_ms as i64);
    timestamps.retain(|ts| *ts > bound);
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let Some(entry) = self.values.get(key) else {
            return Ok(None);
        };
        if entry.is_live(now) {
            return Ok(Some(entry.value.clone()));
        }
        drop(entry);
        self.values.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.values
            .insert(key.to_string(), Expiring::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        let value = self.values.remove(key).is_some_and(|(_, e)| e.is_live(now));
        let window = self.windows.remove(key).is_some_and(|(_, e)| e.is_live(now));
        Ok(value || window)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .values
            .iter()
            .filter(|e| e.key().starts_with(prefix) && e.value().is_live(now))
            .map(|e| e.key().clone())
            .collect();
        keys.extend(
            self.windows
                .iter()
                .filter(|e| e.key().starts_with(prefix) && e.value().is_live(now))
                .map(|e| e.key().clone()),
        );
        keys.sort();
        Ok(keys)
    }

    async fn window_admit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
        limit: u32,
    ) -> Result<WindowAdmission, CacheError> {
        let ttl = window_ttl(window_ms);
        let now = Instant::now();

        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Expiring::new(Vec::new(), ttl));
        if !entry.is_live(now) {
            entry.value.clear();
        }

        prune(&mut entry.value, now_ms, window_ms);
        let mut count = entry.value.len() as u32;
        let admitted = count < limit;
        if admitted {
            entry.value.push(now_ms);
            entry.expires_at = now + ttl;
            count += 1;
        }

        Ok(WindowAdmission {
            admitted,
            state: WindowState {
                count,
                oldest_ms: entry.value.iter().min().copied(),
            },
        })
    }

    async fn window_peek(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
    ) -> Result<WindowState, CacheError> {
        let Some(entry) = self.windows.get(key) else {
            return Ok(WindowState::default());
        };
        if !entry.is_live(Instant::now()) {
            return Ok(WindowState::default());
        }

        let bound = now_ms.saturating_sub(window_ms as i64);
        let live: Vec<i64> = entry.value.iter().copied().filter(|ts| *ts > bound).collect();
        Ok(WindowState {
            count: live.len() as u32,
            oldest_ms: live.iter().min().copied(),
        })
    }
}
