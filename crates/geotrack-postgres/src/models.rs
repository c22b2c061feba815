use geotrack_domain::{LocationPoint, NearbyDevice};
use tokio_postgres::Row;

/// Row shape returned by the radius query
pub struct NearbyDeviceRow {
    pub device_id: String,
    pub lat: f64,
    pub lng: f64,
    pub distance: f64,
    pub timestamp: i64,
}

impl From<&Row> for NearbyDeviceRow {
    fn from(row: &Row) -> Self {
        Self {
            device_id: row.get(0),
            lat: row.get(1),
            lng: row.get(2),
            timestamp: row.get(3),
            distance: row.get(4),
        }
    }
}

impl From<NearbyDeviceRow> for NearbyDevice {
    fn from(row: NearbyDeviceRow) -> Self {
        NearbyDevice {
            device_id: row.device_id,
            lat: row.lat,
            lng: row.lng,
            distance: row.distance,
            timestamp: row.timestamp,
        }
    }
}

/// Row shape returned by the history query; coordinates are read back from
/// the geometry column
pub struct HistoryPointRow {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: i64,
}

impl From<&Row> for HistoryPointRow {
    fn from(row: &Row) -> Self {
        Self {
            lat: row.get(0),
            lng: row.get(1),
            timestamp: row.get(2),
        }
    }
}

impl From<HistoryPointRow> for LocationPoint {
    fn from(row: HistoryPointRow) -> Self {
        LocationPoint {
            lat: row.lat,
            lng: row.lng,
            timestamp: row.timestamp,
        }
    }
}
