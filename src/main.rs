use std::sync::Arc;

use shipping_dispatch::api;
use shipping_dispatch::auth::AuthSettings;
use shipping_dispatch::cache::memory::MemoryCache;
use shipping_dispatch::cache::redis::RedisCache;
use shipping_dispatch::cache::StatusCache;
use shipping_dispatch::config::Config;
use shipping_dispatch::error::AppError;
use shipping_dispatch::geo::NominatimValidator;
use shipping_dispatch::observability;
use shipping_dispatch::state::AppState;
use shipping_dispatch::store::memory::MemoryStore;
use shipping_dispatch::store::postgres::PgStore;
use shipping_dispatch::store::Store;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    observability::init_tracing(&config.log_level, config.log_format);

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections).await?;
            tracing::info!(
                max_connections = config.database_max_connections,
                "postgres store ready"
            );
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let cache: Arc<dyn StatusCache> = match &config.redis_url {
        Some(url) => {
            let cache = RedisCache::connect(url).await?;
            tracing::info!("redis cache ready");
            Arc::new(cache)
        }
        None => {
            tracing::warn!("REDIS_URL not set; using in-memory cache");
            Arc::new(MemoryCache::new())
        }
    };

    let geocoder = NominatimValidator::new(
        &config.geocoding_base_url,
        &config.geocoding_country_codes,
        config.geocoding_timeout,
        &config.geocoding_user_agent,
    )?;

    let app_state = AppState::new(
        store.clone(),
        cache,
        Arc::new(geocoder),
        AuthSettings::new(config.jwt_secret.clone(), config.jwt_expires_in),
        config.cache_ttl,
    )?;
    let app = api::rest::router(Arc::new(app_state));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, env = %config.app_env, "http server started");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")));

    store.shutdown().await;
    tracing::info!("shutdown complete");
    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
