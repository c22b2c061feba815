use crate::error::DomainResult;
use crate::types::{LocationHistory, LocationPing, NearbyDevice};
use async_trait::async_trait;

/// Last-known-location cache contract.
///
/// Implementations (e.g. geotrack-redis) store one entry per device and
/// overwrite it wholesale on every upsert: "latest" is defined by arrival
/// order, not by comparing timestamps. The store serializes per-key writes;
/// updates for different devices never contend.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LatestLocationRepository: Send + Sync {
    /// Replace the latest location for `ping.device_id` unconditionally.
    async fn upsert_latest(&self, ping: &LocationPing) -> DomainResult<()>;

    /// Get the latest location for a device, or None if never seen.
    async fn get_latest(&self, device_id: &str) -> DomainResult<Option<LocationPing>>;

    /// Remove a device's latest location.
    async fn delete_latest(&self, device_id: &str) -> DomainResult<()>;
}

/// Durable, append-only location history contract.
///
/// Implementations (e.g. geotrack-postgres) persist every ping with a derived
/// geospatial point and serve the range/proximity queries over it.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LocationHistoryRepository: Send + Sync {
    /// Append a batch of pings in a single bulk statement.
    async fn insert_batch(&self, pings: &[LocationPing]) -> DomainResult<()>;

    /// Latest row per device within `radius_meters` of the center.
    async fn find_within_radius(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: f64,
    ) -> DomainResult<Vec<NearbyDevice>>;

    /// All rows for a device with timestamp in `[start_millis, end_millis]`,
    /// ordered ascending.
    async fn get_history(
        &self,
        device_id: &str,
        start_millis: i64,
        end_millis: i64,
    ) -> DomainResult<LocationHistory>;

    /// Geographic distance in meters between two positions.
    async fn distance_meters(&self, a: &LocationPing, b: &LocationPing) -> DomainResult<f64>;
}
