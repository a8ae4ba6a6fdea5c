//! MCP Docs Gateway
//!
//! Security layer in front of the documentation service:
//! - API key authentication with role tiers
//! - Token-bucket rate limiting over a shared Redis store
//! - Per-dependency circuit breakers around the package registries

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::state::AppState;
use config::StoreBackend;
use domain::api_key::ApiKeyRepository;
use domain::rate_limit::RateStore;
use infrastructure::api_key::{AuthService, InMemoryApiKeyRepository, RedisApiKeyRepository};
use infrastructure::breaker::BreakerRegistry;
use infrastructure::gate::RequestGate;
use infrastructure::rate_limit::{InMemoryRateStore, RateLimiter, RedisRateStore};
use infrastructure::redis::{RedisStore, RedisStoreConfig};
use infrastructure::upstream::UpstreamClient;
use tracing::info;

/// Create the application state with default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let (key_repository, rate_store, redis): (
        Arc<dyn ApiKeyRepository>,
        Arc<dyn RateStore>,
        Option<RedisStore>,
    ) = match config.store.backend {
        StoreBackend::Redis => {
            let mut store_config = RedisStoreConfig::new(&config.store.redis.url)
                .with_connection_timeout(Duration::from_secs(
                    config.store.redis.connection_timeout_secs,
                ));
            if let Some(prefix) = &config.store.redis.key_prefix {
                store_config = store_config.with_key_prefix(prefix.clone());
            }

            let store = RedisStore::new(store_config).await?;
            store.ping().await?;
            info!("Connected to Redis at {}", config.store.redis.url);

            (
                Arc::new(RedisApiKeyRepository::new(store.clone())),
                Arc::new(RedisRateStore::new(store.clone())),
                Some(store),
            )
        }
        StoreBackend::Memory => {
            info!("Using in-memory store (single process, development only)");
            (
                Arc::new(InMemoryApiKeyRepository::new()),
                Arc::new(InMemoryRateStore::new()),
                None,
            )
        }
    };

    let auth = Arc::new(AuthService::new(key_repository));

    let limiter = Arc::new(RateLimiter::new(rate_store).with_overrides(config.limits.overrides()));

    let breakers = Arc::new(BreakerRegistry::new(
        config.breakers.default.to_settings(),
        config.breakers.dependency_settings(),
    ));

    let upstream = Arc::new(UpstreamClient::new(config.upstream.to_config())?);

    let gate = Arc::new(
        RequestGate::new(auth.clone(), limiter, breakers.clone())
            .with_operation_costs(config.operations.costs.clone()),
    );

    Ok(AppState {
        gate,
        auth,
        breakers,
        upstream,
        redis,
        trusted_proxy: config.server.trusted_proxy,
    })
}
