use crate::domain::LocationIngestService;
use crate::mqtt::parse_topic;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// MQTT transport settings for the ingest subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    /// Wildcard topic addressing all devices
    pub topic: String,
    pub max_retry_attempts: u32,
    pub retry_delay_secs: u64,
}

impl MqttSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            client_id: "geotrack-ingest".to_string(),
            topic: "location/#".to_string(),
            max_retry_attempts: 10,
            retry_delay_secs: 5,
        }
    }
}

/// Run the MQTT subscriber until cancelled, reconnecting on broker errors
/// up to the configured retry limit.
#[instrument(name = "mqtt_subscriber", skip_all, fields(topic = %settings.topic))]
pub async fn run_mqtt_subscriber(
    settings: MqttSettings,
    service: Arc<LocationIngestService>,
    shutdown_token: CancellationToken,
) -> anyhow::Result<()> {
    info!(
        host = %settings.host,
        port = settings.port,
        "starting MQTT subscriber"
    );

    let mut retry_count = 0;

    loop {
        if shutdown_token.is_cancelled() {
            debug!("MQTT subscriber cancelled before connection");
            break;
        }

        match run_mqtt_connection(&settings, &service, &shutdown_token).await {
            Ok(()) => {
                debug!("MQTT subscriber stopped cleanly");
                break;
            }
            Err(e) => {
                error!(error = %e, "MQTT connection error");

                retry_count += 1;
                if retry_count >= settings.max_retry_attempts {
                    error!(
                        max_retries = settings.max_retry_attempts,
                        "max retry attempts reached, stopping MQTT subscriber"
                    );
                    return Err(e);
                }

                warn!(
                    attempt = retry_count,
                    max_attempts = settings.max_retry_attempts,
                    "retrying MQTT connection"
                );

                tokio::select! {
                    _ = shutdown_token.cancelled() => break,
                    _ = tokio::time::sleep(settings.retry_delay()) => {}
                }
            }
        }
    }

    info!("MQTT subscriber stopped");
    Ok(())
}

/// Run a single MQTT connection session
async fn run_mqtt_connection(
    settings: &MqttSettings,
    service: &Arc<LocationIngestService>,
    shutdown_token: &CancellationToken,
) -> anyhow::Result<()> {
    let mut mqtt_options =
        MqttOptions::new(&settings.client_id, &settings.host, settings.port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);
    if !settings.username.is_empty() {
        mqtt_options.set_credentials(&settings.username, &settings.password);
    }

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 100);

    client
        .subscribe(&settings.topic, QoS::AtLeastOnce)
        .await
        .map_err(|e| anyhow::anyhow!("failed to subscribe: {e}"))?;

    info!(topic = %settings.topic, "subscribed to MQTT topic");

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                debug!("shutdown signal received");
                let _ = client.disconnect().await;
                return Ok(());
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        handle_publish(service, &publish.topic, &publish.payload).await;
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        debug!("subscription acknowledged");
                    }
                    Ok(_) => {
                        // Pings, outgoing packets and other events
                    }
                    Err(e) => {
                        return Err(anyhow::anyhow!("MQTT event loop error: {e}"));
                    }
                }
            }
        }
    }
}

/// Handle one inbound publish. Errors never escape: one bad message or a
/// failed cache write must not take down the subscription.
async fn handle_publish(service: &Arc<LocationIngestService>, topic: &str, payload: &[u8]) {
    let topic_device = match parse_topic(topic) {
        Ok(device_id) => device_id,
        Err(e) => {
            warn!(error = %e, topic = %topic, "message on unexpected topic, handling payload anyway");
            ""
        }
    };

    debug!(
        topic = %topic,
        device_id = %topic_device,
        payload_size = payload.len(),
        "received location message"
    );

    if let Err(e) = service.handle_message(payload).await {
        error!(error = %e, topic = %topic, "error processing location message");
    }
}
