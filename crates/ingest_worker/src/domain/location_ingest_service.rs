use crate::batch::BatchBuffer;
use geotrack_domain::{DomainResult, LatestLocationRepository, LocationPing};
use std::sync::Arc;
use tracing::{debug, warn};

/// Handles one inbound transport message end to end: deserialize, validate,
/// update the latest-location cache, append to the batch buffer.
///
/// Malformed or invalid payloads are logged and dropped without error; one
/// bad message never affects the next. Each message is handled independently
/// and never blocks on another's durable write.
pub struct LocationIngestService {
    latest_locations: Arc<dyn LatestLocationRepository>,
    batch_buffer: BatchBuffer,
}

impl LocationIngestService {
    pub fn new(
        latest_locations: Arc<dyn LatestLocationRepository>,
        batch_buffer: BatchBuffer,
    ) -> Self {
        Self {
            latest_locations,
            batch_buffer,
        }
    }

    /// Processes a raw message payload.
    ///
    /// Returns Err only for a failed cache write; the ping is still appended
    /// to the batch buffer in that case, so the durable history does not
    /// depend on the cache being up.
    pub async fn handle_message(&self, payload: &[u8]) -> DomainResult<()> {
        let ping: LocationPing = match serde_json::from_slice(payload) {
            Ok(ping) => ping,
            Err(e) => {
                warn!(error = %e, "dropping undecodable location payload");
                return Ok(());
            }
        };

        if !ping.validate() {
            warn!(
                device_id = %ping.device_id,
                lat = ping.lat,
                lng = ping.lng,
                timestamp = ping.timestamp,
                "dropping invalid location ping"
            );
            return Ok(());
        }

        debug!(device_id = %ping.device_id, "handling location ping");

        // Cache update and history append are independent: a cache failure
        // must not cost the ping its durable write.
        let cache_result = self.latest_locations.upsert_latest(&ping).await;
        self.batch_buffer.append(ping).await;

        cache_result
    }
}
