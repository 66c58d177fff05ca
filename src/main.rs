//! billing-reconciler server binary.

use std::sync::Arc;

use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use billing_reconciler::adapters::cache::CachedSubscriptionStore;
use billing_reconciler::adapters::events::{PublishWorker, PublishWorkerConfig};
use billing_reconciler::adapters::http::{app_router, SubscriptionAppState};
use billing_reconciler::adapters::metrics::MetricsCollector;
use billing_reconciler::adapters::postgres::{
    PostgresSubscriptionStore, PostgresWebhookEventRepository,
};
use billing_reconciler::adapters::redis::{RedisCache, RedisStreamPublisher};
use billing_reconciler::adapters::stripe::{RetryPolicy, StripeConfig, StripeGateway};
use billing_reconciler::config::{AppConfig, ServerConfig};
use billing_reconciler::domain::subscription::SignatureVerifier;
use billing_reconciler::ports::{EventPublisher, SubscriptionStore};

const PROVIDER: &str = "stripe";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config.server);
    tracing::info!(
        environment = ?config.server.environment,
        "Starting billing-reconciler"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let redis = redis::Client::open(config.redis.url.as_str())?
        .get_multiplexed_async_connection()
        .await?;

    let retry = RetryPolicy::default()
        .with_initial_interval(config.payment.retry_initial_interval())
        .with_max_interval(config.payment.retry_max_interval())
        .with_max_elapsed(config.payment.retry_max_elapsed());
    let gateway = StripeGateway::new(
        StripeConfig::new(config.payment.stripe_api_key.clone())
            .with_base_url(config.payment.api_base_url.clone())
            .with_timeout(config.payment.request_timeout())
            .with_retry_policy(retry),
    )?;

    let store: Arc<dyn SubscriptionStore> = Arc::new(CachedSubscriptionStore::new(
        Arc::new(PostgresSubscriptionStore::new(pool.clone())),
        Arc::new(RedisCache::new(redis.clone(), config.redis.operation_timeout())),
        config.redis.cache_ttl(),
    ));

    let stream_publisher: Arc<dyn EventPublisher> = Arc::new(RedisStreamPublisher::new(
        redis,
        config.events.stream_prefix.clone(),
    ));
    let metrics = MetricsCollector::new()?;
    let worker = Arc::new(PublishWorker::spawn(
        stream_publisher,
        PublishWorkerConfig::default()
            .with_publish_timeout(config.events.publish_timeout())
            .with_queue_capacity(config.events.queue_capacity),
        metrics.clone(),
    ));

    let state = SubscriptionAppState {
        store,
        gateway: Arc::new(gateway),
        event_publisher: worker.clone(),
        webhook_log: Arc::new(PostgresWebhookEventRepository::new(pool.clone())),
        verifier: Arc::new(SignatureVerifier::new(SecretString::new(
            config.payment.stripe_webhook_secret.clone(),
        ))),
        provider: PROVIDER.to_string(),
        metrics,
        operator_token: config
            .server
            .operator_token()
            .map(|token| Arc::new(SecretString::new(token.to_string()))),
    };
    if state.operator_token.is_none() {
        tracing::warn!("No operator token configured, webhook event endpoints are closed");
    }
    let app = app_router(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker.shutdown().await;
    let stats = worker.stats();
    tracing::info!(
        published = stats.published,
        failed = stats.failed,
        timed_out = stats.timed_out,
        dropped = stats.dropped,
        "Publish worker drained"
    );
    pool.close().await;

    Ok(())
}

/// JSON logs in production, human-readable otherwise.
fn init_tracing(server: &ServerConfig) {
    let env_filter = EnvFilter::try_new(&server.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if server.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
