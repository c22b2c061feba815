use crate::batch::{BatchBuffer, FlushExecutor};
use crate::config::IngestWorkerConfig;
use crate::domain::LocationIngestService;
use crate::mqtt::run_mqtt_subscriber;
use geotrack_domain::{LatestLocationRepository, LocationHistoryRepository};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wires the ingestion pipeline: MQTT subscriber → message handler →
/// latest-location cache + batch buffer → flush executor → history store.
///
/// Store clients are constructed by the caller and passed in; no component
/// reaches for a global handle.
pub struct IngestWorker {
    service: Arc<LocationIngestService>,
    batch_buffer: BatchBuffer,
    flush_executor: FlushExecutor,
    config: IngestWorkerConfig,
}

impl IngestWorker {
    pub fn new(
        latest_locations: Arc<dyn LatestLocationRepository>,
        location_history: Arc<dyn LocationHistoryRepository>,
        config: IngestWorkerConfig,
    ) -> Self {
        info!("initializing ingest worker");

        let flush_executor = FlushExecutor::new(location_history, config.executor.clone());
        let batch_buffer = BatchBuffer::new(flush_executor.clone(), config.batch.clone());
        let service = Arc::new(LocationIngestService::new(
            latest_locations,
            batch_buffer.clone(),
        ));

        Self {
            service,
            batch_buffer,
            flush_executor,
            config,
        }
    }

    /// Handle to the buffer, for the drain path's final flush.
    pub fn batch_buffer(&self) -> BatchBuffer {
        self.batch_buffer.clone()
    }

    /// Handle to the executor, for the drain path's idle wait.
    pub fn flush_executor(&self) -> FlushExecutor {
        self.flush_executor.clone()
    }

    /// Consumes the worker into runner-compatible processes.
    pub fn into_runner_processes(
        self,
    ) -> Vec<
        Box<
            dyn FnOnce(
                    CancellationToken,
                ) -> std::pin::Pin<
                    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
                > + Send,
        >,
    > {
        vec![Box::new({
            let service = self.service;
            let mqtt = self.config.mqtt;
            move |token| Box::pin(async move { run_mqtt_subscriber(mqtt, service, token).await })
        })]
    }
}
