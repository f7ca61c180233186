//! Redis Integration Tests
//!
//! Exercise `RedisStore` against a live Redis at `REDIS_URL`
//! (default `redis://localhost:6380`).

mod redis_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use fred::interfaces::LuaInterface;
    use tokio::time::sleep;
    use uuid::Uuid;

    use crate::cache::{create_redis_client, now_ms, CacheStore, RedisStore};

    /// Helper to create a store with scripts loaded
    async fn create_test_store() -> RedisStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6380".into());
        let client = create_redis_client(&url)
            .await
            .expect("Failed to connect to Redis");
        let store = RedisStore::new(client);
        store.init().await.expect("Failed to load scripts");
        store
    }

    /// Unique key prefix so parallel runs do not collide
    fn test_prefix() -> String {
        format!("test:{}", Uuid::now_v7().simple())
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_set_get_delete() {
        let store = create_test_store().await;
        let key = format!("{}:value", test_prefix());

        store
            .set(&key, "v", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("v"));

        assert!(store.delete(&key).await.unwrap());
        assert!(!store.delete(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_set_with_millisecond_ttl() {
        let store = create_test_store().await;
        let key = format!("{}:short", test_prefix());

        store
            .set(&key, "v", Duration::from_millis(150))
            .await
            .unwrap();
        assert!(store.get(&key).await.unwrap().is_some());

        sleep(Duration::from_millis(300)).await;
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_keys_with_prefix() {
        let store = create_test_store().await;
        let prefix = test_prefix();

        for i in 0..3 {
            store
                .set(&format!("{prefix}:a:{i}"), "v", Duration::from_secs(30))
                .await
                .unwrap();
        }
        store
            .set(&format!("{prefix}:b:0"), "v", Duration::from_secs(30))
            .await
            .unwrap();

        let keys = store
            .keys_with_prefix(&format!("{prefix}:a:"))
            .await
            .unwrap();
        assert_eq!(keys.len(), 3);

        for key in store.keys_with_prefix(&prefix).await.unwrap() {
            store.delete(&key).await.unwrap();
        }
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_keys_with_prefix_spans_scan_pages() {
        let store = create_test_store().await;
        let prefix = test_prefix();

        for i in 0..1_200 {
            store
                .set(&format!("{prefix}:k:{i}"), "v", Duration::from_secs(30))
                .await
                .unwrap();
        }

        let keys = store.keys_with_prefix(&prefix).await.unwrap();
        assert_eq!(keys.len(), 1_200);
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));

        for key in keys {
            store.delete(&key).await.unwrap();
        }
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_window_admit_enforces_limit() {
        let store = create_test_store().await;
        let key = format!("{}:window", test_prefix());
        let now = now_ms();

        for expected in 1..=3 {
            let admission = store.window_admit(&key, now, 60_000, 3).await.unwrap();
            assert!(admission.admitted);
            assert_eq!(admission.state.count, expected);
            assert_eq!(admission.state.oldest_ms, Some(now));
        }

        let denied = store.window_admit(&key, now, 60_000, 3).await.unwrap();
        assert!(!denied.admitted);
        assert_eq!(denied.state.count, 3);

        let peek = store.window_peek(&key, now, 60_000).await.unwrap();
        assert_eq!(peek.count, 3);

        // Slides: all three fall out once the window has passed.
        let later = now + 60_000;
        let admission = store.window_admit(&key, later, 60_000, 3).await.unwrap();
        assert!(admission.admitted);
        assert_eq!(admission.state.count, 1);

        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_window_admit_is_atomic() {
        let store = Arc::new(create_test_store().await);
        let key = format!("{}:race", test_prefix());
        let now = now_ms();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                let key = key.clone();
                tokio::spawn(async move { store.window_admit(&key, now, 60_000, 10).await })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().admitted {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);

        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_scripts_reload_after_flush() {
        let store = create_test_store().await;
        let key = format!("{}:reload", test_prefix());

        let client = create_redis_client(
            &std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6380".into()),
        )
        .await
        .unwrap();
        client.script_flush(false).await.unwrap();

        let admission = store.window_admit(&key, now_ms(), 60_000, 1).await.unwrap();
        assert!(admission.admitted);

        store.delete(&key).await.unwrap();
    }
}
