use serde::{Deserialize, Serialize};

/// One device location report as delivered on the wire.
///
/// Immutable once validated; also the shape stored in the latest-location
/// cache (the cache overwrites wholesale, so no separate entry type exists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPing {
    pub device_id: String,
    pub lat: f64,
    pub lng: f64,
    /// Epoch milliseconds reported by the device.
    pub timestamp: i64,
}

impl LocationPing {
    /// Pure validity verdict: no side effects, never panics.
    ///
    /// Rejects empty device ids, coordinates outside [-90, 90] / [-180, 180]
    /// (non-finite values included), and negative timestamps.
    pub fn validate(&self) -> bool {
        if self.device_id.is_empty() {
            return false;
        }
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return false;
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return false;
        }
        self.timestamp >= 0
    }
}

/// A device matched by a radius query, with its distance from the center.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyDevice {
    pub device_id: String,
    pub lat: f64,
    pub lng: f64,
    /// Meters from the query center.
    pub distance: f64,
    pub timestamp: i64,
}

/// Distance between the last known positions of two devices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistanceResult {
    pub device_a: String,
    pub device_b: String,
    /// Meters over the geography between the two positions.
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPoint {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: i64,
}

/// Time-ordered location history for a single device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationHistory {
    pub device_id: String,
    pub locations: Vec<LocationPoint>,
}
