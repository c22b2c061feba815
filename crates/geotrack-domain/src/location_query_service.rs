use crate::error::{DomainError, DomainResult};
use crate::repository::{LatestLocationRepository, LocationHistoryRepository};
use crate::types::{DistanceResult, LocationHistory, LocationPing, NearbyDevice};
use std::sync::Arc;
use tracing::debug;

/// Query surface consumed by the HTTP layer.
///
/// Reads the latest-location cache for point lookups and the durable history
/// store for geospatial queries. Holds no state of its own; the radius cap is
/// enforced by the HTTP layer, not here.
pub struct LocationQueryService {
    latest_locations: Arc<dyn LatestLocationRepository>,
    location_history: Arc<dyn LocationHistoryRepository>,
}

impl LocationQueryService {
    pub fn new(
        latest_locations: Arc<dyn LatestLocationRepository>,
        location_history: Arc<dyn LocationHistoryRepository>,
    ) -> Self {
        Self {
            latest_locations,
            location_history,
        }
    }

    /// Last known location for a device, or None if never seen.
    pub async fn get_latest(&self, device_id: &str) -> DomainResult<Option<LocationPing>> {
        self.latest_locations.get_latest(device_id).await
    }

    /// Devices whose latest history row lies within `radius_meters` of the
    /// given center.
    pub async fn find_within_radius(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: f64,
    ) -> DomainResult<Vec<NearbyDevice>> {
        debug!(lat, lng, radius_meters, "radius query");
        self.location_history
            .find_within_radius(lat, lng, radius_meters)
            .await
    }

    /// Location history for a device within an inclusive epoch-millis range.
    pub async fn get_history(
        &self,
        device_id: &str,
        start_millis: i64,
        end_millis: i64,
    ) -> DomainResult<LocationHistory> {
        self.location_history
            .get_history(device_id, start_millis, end_millis)
            .await
    }

    /// Distance in meters between the last known locations of two devices.
    ///
    /// Errors with DeviceNotFound when either device has no cached location.
    pub async fn distance_between(
        &self,
        device_a: &str,
        device_b: &str,
    ) -> DomainResult<DistanceResult> {
        let a = self
            .latest_locations
            .get_latest(device_a)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device_a.to_string()))?;
        let b = self
            .latest_locations
            .get_latest(device_b)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device_b.to_string()))?;

        let distance = self.location_history.distance_meters(&a, &b).await?;

        Ok(DistanceResult {
            device_a: device_a.to_string(),
            device_b: device_b.to_string(),
            distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MockLatestLocationRepository, MockLocationHistoryRepository};

    fn ping(device_id: &str, lat: f64, lng: f64) -> LocationPing {
        LocationPing {
            device_id: device_id.to_string(),
            lat,
            lng,
            timestamp: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn test_get_latest_reads_cache() {
        let mut latest = MockLatestLocationRepository::new();
        let expected = ping("driver_001", 14.5, 121.0);
        let returned = expected.clone();
        latest
            .expect_get_latest()
            .withf(|id| id == "driver_001")
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));

        let service = LocationQueryService::new(
            Arc::new(latest),
            Arc::new(MockLocationHistoryRepository::new()),
        );

        let got = service.get_latest("driver_001").await.unwrap();
        assert_eq!(got, Some(expected));
    }

    #[tokio::test]
    async fn test_distance_between_known_devices() {
        let mut latest = MockLatestLocationRepository::new();
        let a = ping("driver_001", 14.5, 121.0);
        let b = ping("driver_002", 14.6, 121.1);
        let a2 = a.clone();
        let b2 = b.clone();
        latest
            .expect_get_latest()
            .returning(move |id| match id {
                "driver_001" => Ok(Some(a2.clone())),
                "driver_002" => Ok(Some(b2.clone())),
                _ => Ok(None),
            });

        let mut history = MockLocationHistoryRepository::new();
        history
            .expect_distance_meters()
            .withf(move |x, y| x == &a && y == &b)
            .times(1)
            .returning(|_, _| Ok(15_432.7));

        let service = LocationQueryService::new(Arc::new(latest), Arc::new(history));

        let result = service
            .distance_between("driver_001", "driver_002")
            .await
            .unwrap();
        assert_eq!(result.device_a, "driver_001");
        assert_eq!(result.device_b, "driver_002");
        assert!((result.distance - 15_432.7).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_distance_between_unknown_device_errors() {
        let mut latest = MockLatestLocationRepository::new();
        latest.expect_get_latest().returning(|_| Ok(None));

        let service = LocationQueryService::new(
            Arc::new(latest),
            Arc::new(MockLocationHistoryRepository::new()),
        );

        let err = service
            .distance_between("driver_001", "driver_002")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DeviceNotFound(id) if id == "driver_001"));
    }
}
