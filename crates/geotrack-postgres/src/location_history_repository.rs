use crate::client::PostgresClient;
use crate::models::{HistoryPointRow, NearbyDeviceRow};
use async_trait::async_trait;
use geotrack_domain::{
    DomainError, DomainResult, LocationHistory, LocationHistoryRepository, LocationPing,
    NearbyDevice,
};
use tokio_postgres::types::ToSql;
use tracing::{debug, info};

/// Append-only location history in the `location_history` table, with a
/// PostGIS point derived from (lng, lat) in SRID 4326.
#[derive(Clone)]
pub struct PostgresLocationHistoryRepository {
    client: PostgresClient,
}

impl PostgresLocationHistoryRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LocationHistoryRepository for PostgresLocationHistoryRepository {
    async fn insert_batch(&self, pings: &[LocationPing]) -> DomainResult<()> {
        if pings.is_empty() {
            return Ok(());
        }

        debug!(rows = pings.len(), "bulk inserting location history");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        // One multi-row statement per batch: 4 parameters per ping, the
        // geometry point is derived from the same lng/lat placeholders.
        let mut placeholders = Vec::with_capacity(pings.len());
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(pings.len() * 4);
        for (i, ping) in pings.iter().enumerate() {
            let offset = i * 4;
            placeholders.push(format!(
                "(${}, ${}, ${}, ST_SetSRID(ST_MakePoint(${}, ${}), 4326), ${})",
                offset + 1,
                offset + 2,
                offset + 3,
                offset + 3,
                offset + 2,
                offset + 4,
            ));
            params.push(&ping.device_id);
            params.push(&ping.lat);
            params.push(&ping.lng);
            params.push(&ping.timestamp);
        }

        let statement = format!(
            "INSERT INTO location_history (device_id, lat, lng, geometry, timestamp)
             VALUES {}",
            placeholders.join(", ")
        );

        conn.execute(statement.as_str(), &params)
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        info!(rows = pings.len(), "location history batch written");
        Ok(())
    }

    async fn find_within_radius(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: f64,
    ) -> DomainResult<Vec<NearbyDevice>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "SELECT DISTINCT ON (device_id)
                     device_id,
                     lat,
                     lng,
                     timestamp,
                     ST_Distance(
                         geometry::geography,
                         ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography
                     ) AS distance
                 FROM location_history
                 WHERE ST_DWithin(
                     geometry::geography,
                     ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography,
                     $3
                 )
                 ORDER BY device_id, timestamp DESC",
                &[&lat, &lng, &radius_meters],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows
            .iter()
            .map(|row| NearbyDeviceRow::from(row).into())
            .collect())
    }

    async fn get_history(
        &self,
        device_id: &str,
        start_millis: i64,
        end_millis: i64,
    ) -> DomainResult<LocationHistory> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "SELECT
                     ST_Y(geometry) AS lat,
                     ST_X(geometry) AS lng,
                     timestamp
                 FROM location_history
                 WHERE device_id = $1
                   AND timestamp >= $2
                   AND timestamp <= $3
                 ORDER BY timestamp ASC",
                &[&device_id, &start_millis, &end_millis],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(LocationHistory {
            device_id: device_id.to_string(),
            locations: rows
                .iter()
                .map(|row| HistoryPointRow::from(row).into())
                .collect(),
        })
    }

    async fn distance_meters(&self, a: &LocationPing, b: &LocationPing) -> DomainResult<f64> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                "SELECT ST_Distance(
                     ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
                     ST_SetSRID(ST_MakePoint($3, $4), 4326)::geography
                 ) AS distance",
                &[&a.lng, &a.lat, &b.lng, &b.lat],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.get(0))
    }
}
