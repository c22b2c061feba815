use geotrack_domain::{LocationHistoryRepository, LocationPing};
use geotrack_postgres::{PostgresClient, PostgresConfig, PostgresLocationHistoryRepository};
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::Image;

/// PostGIS-enabled Postgres image; the stock postgres module lacks the
/// extension the geometry column needs.
#[derive(Debug, Default, Clone)]
struct Postgis;

impl Image for Postgis {
    fn name(&self) -> &str {
        "postgis/postgis"
    }

    fn tag(&self) -> &str {
        "16-3.4"
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        vec![WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        )]
    }

    fn env_vars(
        &self,
    ) -> impl IntoIterator<
        Item = (
            impl Into<std::borrow::Cow<'_, str>>,
            impl Into<std::borrow::Cow<'_, str>>,
        ),
    > {
        [
            ("POSTGRES_DB", "gps_db"),
            ("POSTGRES_USER", "postgres"),
            ("POSTGRES_PASSWORD", "postgres"),
        ]
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &[ContainerPort::Tcp(5432)]
    }
}

async fn start_repository() -> (
    testcontainers::ContainerAsync<Postgis>,
    PostgresLocationHistoryRepository,
) {
    let container = Postgis.start().await.unwrap();
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();

    let client = PostgresClient::new(&PostgresConfig {
        host: host.to_string(),
        port,
        database: "gps_db".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 4,
    })
    .unwrap();
    client.ping().await.unwrap();

    // Apply the migrations
    let conn = client.get_connection().await.unwrap();
    for migration in [
        include_str!("../migrations/0001_enable_postgis.sql"),
        include_str!("../migrations/0002_create_location_history.sql"),
    ] {
        conn.batch_execute(migration).await.unwrap();
    }

    (container, PostgresLocationHistoryRepository::new(client))
}

fn ping(device_id: &str, lat: f64, lng: f64, timestamp: i64) -> LocationPing {
    LocationPing {
        device_id: device_id.to_string(),
        lat,
        lng,
        timestamp,
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_insert_batch_and_get_history() {
    let (_container, repo) = start_repository().await;

    let batch = vec![
        ping("driver_001", 14.5547, 121.0244, 1_000),
        ping("driver_001", 14.5550, 121.0250, 2_000),
        ping("driver_002", 14.6000, 121.1000, 1_500),
    ];
    repo.insert_batch(&batch).await.unwrap();

    let history = repo.get_history("driver_001", 0, 3_000).await.unwrap();
    assert_eq!(history.device_id, "driver_001");
    assert_eq!(history.locations.len(), 2);
    // Ascending timestamp order, coordinates round-tripped via the geometry
    assert_eq!(history.locations[0].timestamp, 1_000);
    assert!((history.locations[0].lat - 14.5547).abs() < 1e-9);
    assert!((history.locations[0].lng - 121.0244).abs() < 1e-9);
    assert_eq!(history.locations[1].timestamp, 2_000);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_get_history_range_is_inclusive() {
    let (_container, repo) = start_repository().await;

    repo.insert_batch(&[
        ping("driver_001", 14.5, 121.0, 1_000),
        ping("driver_001", 14.5, 121.0, 2_000),
        ping("driver_001", 14.5, 121.0, 3_000),
    ])
    .await
    .unwrap();

    let history = repo.get_history("driver_001", 1_000, 2_000).await.unwrap();
    assert_eq!(history.locations.len(), 2);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_find_within_radius_returns_latest_row_per_device() {
    let (_container, repo) = start_repository().await;

    repo.insert_batch(&[
        // driver_001 moved; only the newest row should be reported
        ping("driver_001", 14.5547, 121.0244, 1_000),
        ping("driver_001", 14.5560, 121.0260, 2_000),
        // driver_002 is roughly 100 km away, outside the radius
        ping("driver_002", 15.5000, 121.5000, 1_000),
    ])
    .await
    .unwrap();

    let nearby = repo
        .find_within_radius(14.5547, 121.0244, 5_000.0)
        .await
        .unwrap();

    assert_eq!(nearby.len(), 1);
    assert_eq!(nearby[0].device_id, "driver_001");
    assert_eq!(nearby[0].timestamp, 2_000);
    assert!(nearby[0].distance < 5_000.0);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_distance_meters() {
    let (_container, repo) = start_repository().await;

    let a = ping("driver_001", 14.5547, 121.0244, 1_000);
    let b = ping("driver_002", 14.5547, 121.0344, 1_000);

    let distance = repo.distance_meters(&a, &b).await.unwrap();
    // ~0.01 degrees of longitude near 14.5°N is roughly 1.08 km
    assert!(distance > 900.0 && distance < 1_300.0);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_insert_empty_batch_is_noop() {
    let (_container, repo) = start_repository().await;

    repo.insert_batch(&[]).await.unwrap();
    let history = repo.get_history("driver_001", 0, i64::MAX).await.unwrap();
    assert!(history.locations.is_empty());
}
