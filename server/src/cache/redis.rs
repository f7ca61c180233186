//! Redis-backed cache store.
//!
//! Window records are sorted sets scored by request timestamp. Admission
//! runs as a single Lua script so prune, count and append cannot interleave
//! with another request for the same key. Key listing never runs inside a
//! script.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use fred::types::Key;
use futures::TryStreamExt;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use super::{window_ttl, CacheError, CacheStore, WindowAdmission, WindowState};

/// Embedded Lua script for atomic sliding-window admission.
const WINDOW_ADMIT_SCRIPT: &str = include_str!("window_admit.lua");

/// Embedded Lua script for a read-only window snapshot.
const WINDOW_PEEK_SCRIPT: &str = include_str!("window_peek.lua");

/// SCAN COUNT hint used by prefix listing.
const SCAN_BATCH: u32 = 500;

/// Lua script return code for an admitted request.
const SCRIPT_ADMITTED: i64 = 1;

/// Script SHAs loaded in Redis.
#[derive(Clone, Default)]
struct ScriptShas {
    window_admit: String,
    window_peek: String,
}

#[derive(Clone, Copy)]
enum Script {
    WindowAdmit,
    WindowPeek,
}

/// Connect to Redis and wait for the connection to come up.
pub async fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let config = Config::from_url(redis_url)?;
    let client = Client::new(config, None, None, None);
    client.connect();
    client.wait_for_connect().await?;

    info!("Connected to Redis");
    Ok(client)
}

/// [`CacheStore`] over a shared fred client.
#[derive(Clone)]
pub struct RedisStore {
    redis: Client,
    scripts: Arc<RwLock<ScriptShas>>,
}

impl RedisStore {
    /// Creates a store. Call `init()` before use to load the Lua scripts.
    pub fn new(redis: Client) -> Self {
        Self {
            redis,
            scripts: Arc::new(RwLock::new(ScriptShas::default())),
        }
    }

    /// Loads the Lua scripts into Redis.
    pub async fn init(&self) -> Result<(), CacheError> {
        self.load_scripts().await
    }

    /// Loads or reloads Lua scripts. Called during init and on NOSCRIPT.
    async fn load_scripts(&self) -> Result<(), CacheError> {
        let window_admit: String = self.redis.script_load(WINDOW_ADMIT_SCRIPT).await?;
        let window_peek: String = self.redis.script_load(WINDOW_PEEK_SCRIPT).await?;

        info!(
            window_admit_sha = %window_admit,
            window_peek_sha = %window_peek,
            "Lua scripts loaded into Redis"
        );

        let mut scripts = self.scripts.write().await;
        scripts.window_admit = window_admit;
        scripts.window_peek = window_peek;
        Ok(())
    }

    fn is_noscript_error(error: &Error) -> bool {
        error.to_string().contains("NOSCRIPT")
    }

    async fn sha(&self, script: Script) -> String {
        let scripts = self.scripts.read().await;
        match script {
            Script::WindowAdmit => scripts.window_admit.clone(),
            Script::WindowPeek => scripts.window_peek.clone(),
        }
    }

    /// Runs a loaded script, reloading once if Redis has lost it.
    async fn evalsha_ints(
        &self,
        script: Script,
        key: &str,
        args: Vec<String>,
    ) -> Result<Vec<i64>, CacheError> {
        let sha = self.sha(script).await;
        let result: Result<Vec<i64>, _> = self.redis.evalsha(&sha, vec![key], args.clone()).await;

        match result {
            Ok(r) => Ok(r),
            Err(e) if Self::is_noscript_error(&e) => {
                warn!("NOSCRIPT error, reloading Lua scripts");
                self.load_scripts().await?;

                let sha = self.sha(script).await;
                Ok(self.redis.evalsha(&sha, vec![key], args).await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Escape glob metacharacters so a literal prefix can be used with MATCH.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

fn oldest(raw: i64) -> Option<i64> {
    (raw >= 0).then_some(raw)
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.redis.get::<Option<String>, _>(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let ttl_ms = ttl.as_millis().max(1) as i64;
        self.redis
            .set::<(), _, _>(key, value, Some(Expiration::PX(ttl_ms)), None, false)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let deleted: i64 = self.redis.del(key).await?;
        Ok(deleted > 0)
    }

    /// Pages through SCAN from the client, so Redis serves other commands
    /// between pages. Clustered clients scan every primary.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let pattern = escape_glob(prefix);
        let found: Vec<Key> = if self.redis.is_clustered() {
            self.redis
                .scan_cluster_buffered(pattern, Some(SCAN_BATCH), None)
                .try_collect()
                .await?
        } else {
            self.redis
                .scan_buffered(pattern, Some(SCAN_BATCH), None)
                .try_collect()
                .await?
        };

        let mut keys: Vec<String> = found.into_iter().filter_map(Key::into_string).collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn window_admit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
        limit: u32,
    ) -> Result<WindowAdmission, CacheError> {
        let prune_bound = now_ms.saturating_sub(window_ms as i64);
        let ttl_ms = window_ttl(window_ms).as_millis() as i64;
        let args = vec![
            now_ms.to_string(),
            prune_bound.to_string(),
            limit.to_string(),
            format!("{now_ms}-{}", Uuid::now_v7().simple()),
            ttl_ms.to_string(),
        ];

        let reply = self.evalsha_ints(Script::WindowAdmit, key, args).await?;
        let &[admitted, count, first] = reply.as_slice() else {
            return Err(CacheError::Corrupt(format!(
                "window admit reply has {} elements",
                reply.len()
            )));
        };

        Ok(WindowAdmission {
            admitted: admitted == SCRIPT_ADMITTED,
            state: WindowState {
                count: count.max(0) as u32,
                oldest_ms: oldest(first),
            },
        })
    }

    async fn window_peek(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
    ) -> Result<WindowState, CacheError> {
        let bound = format!("({}", now_ms.saturating_sub(window_ms as i64));
        let reply = self.evalsha_ints(Script::WindowPeek, key, vec![bound]).await?;
        let &[count, first] = reply.as_slice() else {
            return Err(CacheError::Corrupt(format!(
                "window peek reply has {} elements",
                reply.len()
            )));
        };

        Ok(WindowState {
            count: count.max(0) as u32,
            oldest_ms: oldest(first),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("warden:rl:window:"), "warden:rl:window:*");
        assert_eq!(escape_glob("a*b?[c]"), "a\\*b\\?\\[c\\]*");
    }

    #[test]
    fn test_oldest_sentinel() {
        assert_eq!(oldest(-1), None);
        assert_eq!(oldest(1_700_000_000_000), Some(1_700_000_000_000));
    }
}
