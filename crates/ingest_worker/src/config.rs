use crate::batch::{BatchBufferConfig, FlushExecutorConfig};
use crate::mqtt::MqttSettings;

/// Configuration for the ingest worker
#[derive(Debug, Clone, Default)]
pub struct IngestWorkerConfig {
    pub mqtt: MqttSettings,
    pub batch: BatchBufferConfig,
    pub executor: FlushExecutorConfig,
}
