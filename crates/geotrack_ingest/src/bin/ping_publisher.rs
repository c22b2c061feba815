//! Synthetic location publisher for exercising the ingest pipeline locally.
//!
//! Publishes pings for a handful of simulated devices wandering around a
//! fixed origin, one ping per device every two seconds.

use rand::Rng;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde_json::json;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const ORIGIN_LAT: f64 = 14.5547;
const ORIGIN_LNG: f64 = 121.0244;
const DEVICE_COUNT: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let host = std::env::var("GEOTRACK_MQTT_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("GEOTRACK_MQTT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1883);

    let mut mqtt_options = MqttOptions::new("geotrack-ping-publisher", &host, port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 10);

    // The event loop must be polled for publishes to go out
    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                error!(error = %e, "MQTT event loop error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });

    info!(host = %host, port, devices = DEVICE_COUNT, "publishing synthetic pings");

    let mut interval = tokio::time::interval(Duration::from_secs(2));
    loop {
        interval.tick().await;

        for n in 0..DEVICE_COUNT {
            let device_id = format!("driver_{:03}", n);
            let payload = synthetic_ping(&device_id);

            client
                .publish(
                    format!("location/{}", device_id),
                    QoS::AtLeastOnce,
                    false,
                    payload.to_string(),
                )
                .await?;
        }

        info!(devices = DEVICE_COUNT, "published ping round");
    }
}

fn synthetic_ping(device_id: &str) -> serde_json::Value {
    let mut rng = rand::thread_rng();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    json!({
        "deviceId": device_id,
        "lat": ORIGIN_LAT + rng.gen_range(-0.01..0.01),
        "lng": ORIGIN_LNG + rng.gen_range(-0.01..0.01),
        "timestamp": timestamp,
    })
}
