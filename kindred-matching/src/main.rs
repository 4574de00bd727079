use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;

mod config;
mod events;
mod matching;
mod models;
mod notify;
mod profiles;
mod routes;
mod schema;
mod store;

use config::{AppConfig, StoreBackend};
use kindred_shared::clients::db;
use kindred_shared::clients::rabbitmq::RabbitMQClient;
use kindred_shared::clients::redis::RedisClient;
use matching::cache::PairStateCache;
use matching::MatchCoordinator;
use notify::RabbitMqNotifier;
use profiles::HttpProfileResolver;
use store::{MemoryRelationshipStore, PgRelationshipStore, RelationshipStore};

pub struct AppState {
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub coordinator: MatchCoordinator,
    pub cache: PairStateCache,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kindred_shared::middleware::init_tracing("kindred-matching");

    let config = AppConfig::load()?;
    let port = config.port;

    // The shared AuthUser extractor reads the secret from the environment
    std::env::set_var("JWT_SECRET", &config.jwt_secret);

    let metrics_handle = kindred_shared::middleware::init_metrics()?;

    let store: Arc<dyn RelationshipStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&config.database_url, config.db_pool_size)?;
            Arc::new(PgRelationshipStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory relationship store, data is lost on restart");
            Arc::new(MemoryRelationshipStore::new())
        }
    };

    // Infrastructure clients
    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
    let redis = RedisClient::connect(&config.redis_url).await?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let coordinator = MatchCoordinator::new(
        store,
        Arc::new(HttpProfileResolver::new(http_client, &config.user_service_url)),
        Arc::new(RabbitMqNotifier::new(rabbitmq.clone(), config.notify_retry())),
        config.retry_policy(),
    );
    let cache = PairStateCache::new(redis, config.pair_cache_ttl_secs);

    let state = Arc::new(AppState {
        config,
        rabbitmq,
        coordinator,
        cache,
        metrics_handle,
    });

    // Spawn RabbitMQ subscriber for user.deleted events
    let sub_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_user_deleted(sub_state).await {
            tracing::error!(error = %e, "user.deleted subscriber failed");
        }
    });

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "kindred-matching starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
