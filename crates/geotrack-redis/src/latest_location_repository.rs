use crate::client::RedisClient;
use anyhow::Context;
use async_trait::async_trait;
use geotrack_domain::{DomainError, DomainResult, LatestLocationRepository, LocationPing};
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::debug;

/// Latest-location cache backed by a Redis hash per device.
///
/// Key pattern `device:<deviceId>`, fields `lat`, `lng`, `timestamp` stored
/// as strings. Upserts overwrite unconditionally: the entry reflects arrival
/// order, not the highest timestamp. Redis serializes writes per key, so no
/// additional locking is needed and different devices never contend.
#[derive(Clone)]
pub struct RedisLatestLocationRepository {
    client: RedisClient,
}

impl RedisLatestLocationRepository {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    fn device_key(device_id: &str) -> String {
        format!("device:{device_id}")
    }

    fn parse_field(fields: &HashMap<String, String>, name: &str) -> DomainResult<f64> {
        let raw = fields
            .get(name)
            .ok_or_else(|| DomainError::RepositoryError(anyhow::anyhow!("missing field {name}")))?;
        raw.parse::<f64>()
            .with_context(|| format!("invalid numeric field {name}: {raw}"))
            .map_err(DomainError::RepositoryError)
    }
}

#[async_trait]
impl LatestLocationRepository for RedisLatestLocationRepository {
    async fn upsert_latest(&self, ping: &LocationPing) -> DomainResult<()> {
        debug!(device_id = %ping.device_id, "updating latest location");

        let mut conn = self.client.connection();
        let fields = [
            ("lat", ping.lat.to_string()),
            ("lng", ping.lng.to_string()),
            ("timestamp", ping.timestamp.to_string()),
        ];
        conn.hset_multiple::<_, _, _, ()>(Self::device_key(&ping.device_id), &fields)
            .await
            .context("failed to write latest location")
            .map_err(DomainError::RepositoryError)?;

        Ok(())
    }

    async fn get_latest(&self, device_id: &str) -> DomainResult<Option<LocationPing>> {
        let mut conn = self.client.connection();
        let fields: HashMap<String, String> = conn
            .hgetall(Self::device_key(device_id))
            .await
            .context("failed to read latest location")
            .map_err(DomainError::RepositoryError)?;

        if fields.is_empty() {
            return Ok(None);
        }

        let lat = Self::parse_field(&fields, "lat")?;
        let lng = Self::parse_field(&fields, "lng")?;
        let timestamp = fields
            .get("timestamp")
            .ok_or_else(|| DomainError::RepositoryError(anyhow::anyhow!("missing field timestamp")))?
            .parse::<i64>()
            .context("invalid timestamp field")
            .map_err(DomainError::RepositoryError)?;

        Ok(Some(LocationPing {
            device_id: device_id.to_string(),
            lat,
            lng,
            timestamp,
        }))
    }

    async fn delete_latest(&self, device_id: &str) -> DomainResult<()> {
        let mut conn = self.client.connection();
        conn.del::<_, ()>(Self::device_key(device_id))
            .await
            .context("failed to delete latest location")
            .map_err(DomainError::RepositoryError)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_key_pattern() {
        assert_eq!(
            RedisLatestLocationRepository::device_key("driver_001"),
            "device:driver_001"
        );
    }

    #[test]
    fn test_parse_field_rejects_garbage() {
        let mut fields = HashMap::new();
        fields.insert("lat".to_string(), "not-a-number".to_string());
        let result = RedisLatestLocationRepository::parse_field(&fields, "lat");
        assert!(result.is_err());
    }
}
