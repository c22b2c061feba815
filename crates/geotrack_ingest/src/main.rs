mod config;
mod telemetry;

use config::ServiceConfig;
use geotrack_domain::{LatestLocationRepository, LocationHistoryRepository};
use geotrack_postgres::{PostgresClient, PostgresConfig, PostgresLocationHistoryRepository};
use geotrack_redis::{RedisClient, RedisConfig, RedisLatestLocationRepository};
use geotrack_runner::Runner;
use ingest_worker::batch::{BatchBufferConfig, FlushExecutorConfig};
use ingest_worker::config::IngestWorkerConfig;
use ingest_worker::ingest_worker::IngestWorker;
use ingest_worker::mqtt::MqttSettings;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = telemetry::init_telemetry(&config.log_level) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(
        mqtt_topic = %config.mqtt_topic,
        batch_size = config.batch_size,
        batch_interval_ms = config.batch_interval_ms,
        "Starting geotrack ingest service"
    );

    let (latest_locations, location_history) = match initialize_stores(&config).await {
        Ok(stores) => stores,
        Err(e) => {
            error!("Failed to initialize stores: {:#}", e);
            std::process::exit(1);
        }
    };

    let worker = IngestWorker::new(
        latest_locations,
        location_history,
        build_worker_config(&config),
    );

    // Handles kept out of the worker for the drain path
    let batch_buffer = worker.batch_buffer();
    let flush_executor = worker.flush_executor();

    let mut runner = Runner::new().with_closer_timeout(Duration::from_secs(
        config.closer_timeout_secs,
    ));

    for process in worker.into_runner_processes() {
        runner = runner.with_boxed_process(process);
    }

    // Drain: push the residual batch, then wait for every queued write
    runner = runner.with_closer(move || async move {
        info!("flushing residual batch before shutdown");
        batch_buffer.flush().await;
        flush_executor.on_idle().await;
        info!("all pending batches written");
        Ok(())
    });

    runner.run().await;
}

async fn initialize_stores(
    config: &ServiceConfig,
) -> anyhow::Result<(
    Arc<dyn LatestLocationRepository>,
    Arc<dyn LocationHistoryRepository>,
)> {
    info!("Initializing Redis...");
    let redis_config = RedisConfig {
        host: config.redis_host.clone(),
        port: config.redis_port,
    };
    let redis_client = RedisClient::connect(&redis_config.url()).await?;
    redis_client.ping().await?;

    info!("Initializing PostgreSQL...");
    let postgres_config = PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_max_pool_size,
    };
    let postgres_client = PostgresClient::new(&postgres_config)?;
    postgres_client.ping().await?;

    Ok((
        Arc::new(RedisLatestLocationRepository::new(redis_client)),
        Arc::new(PostgresLocationHistoryRepository::new(postgres_client)),
    ))
}

fn build_worker_config(config: &ServiceConfig) -> IngestWorkerConfig {
    IngestWorkerConfig {
        mqtt: MqttSettings {
            host: config.mqtt_host.clone(),
            port: config.mqtt_port,
            username: config.mqtt_username.clone(),
            password: config.mqtt_password.clone(),
            client_id: config.mqtt_client_id.clone(),
            topic: config.mqtt_topic.clone(),
            max_retry_attempts: config.mqtt_max_retry_attempts,
            retry_delay_secs: config.mqtt_retry_delay_secs,
        },
        batch: BatchBufferConfig {
            max_size: config.batch_size,
            flush_interval: Duration::from_millis(config.batch_interval_ms),
        },
        executor: FlushExecutorConfig {
            concurrency: config.flush_concurrency,
        },
    }
}
