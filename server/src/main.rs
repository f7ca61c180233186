//! Warden Server - Main Entry Point
//!
//! Token issuance and request admission control.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use warden_server::{
    api,
    auth::TokenService,
    cache::{create_redis_client, CacheStore, MemoryStore, RedisStore},
    config::{self, CacheBackend},
    ratelimit::RateLimiter,
};

/// How often expired entries are swept from the in-memory store.
const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        cache_backend = %config.cache_backend,
        "Starting Warden Server"
    );

    // Initialize cache store
    let store: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Redis => {
            let redis = create_redis_client(&config.redis_url).await?;
            let store = RedisStore::new(redis);
            store
                .init()
                .await
                .context("Failed to load cache scripts into Redis")?;
            Arc::new(store) as Arc<dyn CacheStore>
        }
        CacheBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            spawn_memory_sweeper(Arc::clone(&store));
            tracing::warn!("Using in-memory cache store; state is not shared between instances");
            store as Arc<dyn CacheStore>
        }
    };

    // Initialize services
    let tokens = TokenService::new(config.token.clone(), Arc::clone(&store));
    let rate_limiter = RateLimiter::new(store, config.rate_limit.clone());
    if rate_limiter.config().enabled {
        info!(rules = rate_limiter.config().rules.len(), "Rate limiter initialized");
    } else {
        info!("Rate limiting disabled by configuration");
    }

    // Build application state
    let state = api::AppState::new(tokens, rate_limiter, config.clone());

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    info!("Server shutdown complete");

    Ok(())
}

fn spawn_memory_sweeper(store: Arc<MemoryStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MEMORY_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            store.purge_expired();
        }
    });
}
