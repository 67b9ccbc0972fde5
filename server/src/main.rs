//! Atlas service process.
//!
//! Starts, in order: configuration, tracing, metrics, Postgres (with schema),
//! the registry backend, the Kafka producer, the processors, the consumer,
//! the sweeps, then the HTTP and metrics listeners. Runs until Ctrl+C or
//! SIGTERM, then drains every task.

use anyhow::Context as _;
use atlas_core::environment::{Clock, SystemClock};
use atlas_core::producer::Producer;
use atlas_postgres::{PoolConfig, apply_schema, connect};
use atlas_redpanda::{KafkaConsumer, KafkaProducer};
use atlas_runtime::metrics::MetricsServer;
use atlas_runtime::{ShutdownCoordinator, spawn_sweep, wait_for_signal};
use atlas_server::{Config, Services, build_router, metrics_router, registry_backend};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        brokers = %config.redpanda.brokers,
        consumer_group = %config.redpanda.consumer_group,
        redis = config.redis.url.is_some(),
        topics = ?config.consumed_topics(),
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = format!("{}:{}", config.server.metrics_host, config.server.metrics_port)
        .parse()
        .context("invalid metrics address")?;
    let mut metrics = MetricsServer::new(metrics_addr);
    metrics.start()?;
    let metrics = Arc::new(metrics);

    let pool = connect(&PoolConfig {
        url: config.postgres.url.clone(),
        max_connections: config.postgres.max_connections,
        min_connections: config.postgres.min_connections,
        acquire_timeout: Duration::from_secs(config.postgres.acquire_timeout),
    })
    .await?;
    for schema in [
        atlas_fame::store::SCHEMA,
        atlas_cashshop::store::SCHEMA,
        atlas_cashshop::wallet::store::SCHEMA,
        atlas_login_history::store::SCHEMA,
    ] {
        apply_schema(&pool, schema).await?;
    }

    let backend = registry_backend(&config.redis).await?;
    let producer: Arc<dyn Producer> = Arc::new(
        KafkaProducer::builder()
            .brokers(&config.redpanda.brokers)
            .producer_acks(&config.redpanda.producer_acks)
            .build()?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let services = Services::new(&config, &backend, &pool, producer, &clock);

    let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(config.server.shutdown_timeout));

    let consumer = KafkaConsumer::builder()
        .brokers(&config.redpanda.brokers)
        .consumer_group(&config.redpanda.consumer_group)
        .auto_offset_reset(&config.redpanda.auto_offset_reset)
        .build(&services.dispatcher(&config.redpanda.topics))?;
    coordinator.track("consumer", tokio::spawn(consumer.run(coordinator.subscribe())));

    for sweep in services.sweeps(&config.sweeps) {
        let name = sweep.name();
        coordinator.track(name, spawn_sweep(sweep, coordinator.subscribe()));
    }

    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("failed to bind {http_addr}"))?;
    coordinator.track("http", serve("http", listener, build_router(services), coordinator.subscribe()));

    let listener = TcpListener::bind(metrics.addr())
        .await
        .with_context(|| format!("failed to bind {}", metrics.addr()))?;
    coordinator.track(
        "metrics",
        serve("metrics", listener, metrics_router(metrics.clone()), coordinator.subscribe()),
    );

    tracing::info!(http = %http_addr, metrics = %metrics_addr, "Atlas server running");
    wait_for_signal().await;

    let failed = coordinator.shutdown().await;
    pool.close().await;
    if failed.is_empty() {
        tracing::info!("Shutdown complete");
    } else {
        tracing::warn!(tasks = ?failed, "Shutdown complete with unfinished tasks");
    }
    Ok(())
}

fn serve(
    name: &'static str,
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let stop = async move {
            let _ = shutdown.recv().await;
        };
        if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(stop).await {
            tracing::error!(listener = name, error = %e, "server failed");
        }
    })
}
