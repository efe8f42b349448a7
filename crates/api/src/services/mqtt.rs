//! MQTT ingestion manager.
//!
//! One subscriber task per active [`ExternalMqttSource`]. Each task owns a
//! rumqttc event loop: publishes are parsed, normalized and stored;
//! unparseable payloads are logged and dropped; connection errors bump the
//! source's failure counter and the loop retries after a fixed delay.
//! Activate/deactivate endpoints start and stop tasks at runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mongodb::Database;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use domain::models::external_mqtt_source::MqttTestResponse;
use domain::models::ExternalMqttSource;
use domain::services::normalization;
use persistence::repositories::{ExternalAirQualityRepository, ExternalMqttSourceRepository};

use crate::config::MqttConfig;
use crate::middleware::metrics::{record_payload_dropped, record_reading_stored};
use crate::services::hub::{EventHub, NEW_EXTERNAL_AIR_QUALITY};

struct SourceTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    readings: ExternalAirQualityRepository,
    sources: ExternalMqttSourceRepository,
    hub: EventHub,
    config: MqttConfig,
    tasks: Mutex<HashMap<String, SourceTask>>,
}

/// Registry of running subscriber tasks.
#[derive(Clone)]
pub struct MqttManager {
    inner: Arc<Inner>,
}

impl MqttManager {
    pub fn new(db: Database, hub: EventHub, config: MqttConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                readings: ExternalAirQualityRepository::new(db.clone()),
                sources: ExternalMqttSourceRepository::new(db),
                hub,
                config,
                tasks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start subscriber tasks for every source stored as active. Called at
    /// boot so registrations survive restarts.
    pub async fn start_registered(&self) -> Result<usize, mongodb::error::Error> {
        let sources = self.inner.sources.find_active().await?;
        let count = sources.len();
        for source in sources {
            self.activate(source).await;
        }
        Ok(count)
    }

    /// Start a subscriber task for `source`. Idempotent per source id.
    pub async fn activate(&self, source: ExternalMqttSource) {
        let mut tasks = self.inner.tasks.lock().await;
        if tasks.contains_key(&source.id) {
            debug!(source_id = %source.id, "MQTT source already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let id = source.id.clone();

        info!(
            source_id = %id,
            host = %source.host,
            topic = %source.topic,
            "Starting MQTT subscriber"
        );

        let handle = tokio::spawn(async move {
            subscribe_loop(inner, source, shutdown_rx).await;
        });

        tasks.insert(
            id,
            SourceTask {
                shutdown: shutdown_tx,
                handle,
            },
        );
    }

    /// Stop the subscriber task for a source. Returns whether one was
    /// running.
    pub async fn deactivate(&self, source_id: &str) -> bool {
        let task = self.inner.tasks.lock().await.remove(source_id);
        match task {
            Some(task) => {
                let _ = task.shutdown.send(true);
                if let Err(e) = task.handle.await {
                    warn!(source_id = source_id, "MQTT task panicked: {}", e);
                }
                info!(source_id = source_id, "MQTT subscriber stopped");
                true
            }
            None => false,
        }
    }

    /// Number of running subscriber tasks.
    pub async fn active_count(&self) -> usize {
        self.inner.tasks.lock().await.len()
    }

    /// Stop all subscriber tasks (host shutdown).
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.inner.tasks.lock().await.keys().cloned().collect();
        for id in ids {
            self.deactivate(&id).await;
        }
    }

    /// Bounded connection probe: connects, waits for the broker's CONNACK,
    /// disconnects. Nothing is stored.
    pub async fn probe(&self, source: &ExternalMqttSource) -> MqttTestResponse {
        let budget = Duration::from_secs(self.inner.config.test_timeout_secs);
        let start = Instant::now();

        let mut options = broker_options(source, &self.inner.config, "probe");
        options.set_clean_session(true);
        let (client, mut event_loop) = AsyncClient::new(options, 8);

        let outcome = tokio::time::timeout(budget, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        if ack.code == ConnectReturnCode::Success {
                            return Ok(());
                        }
                        return Err(format!("Broker refused connection: {:?}", ack.code));
                    }
                    Ok(_) => {}
                    Err(e) => return Err(e.to_string()),
                }
            }
        })
        .await;

        let _ = client.disconnect().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(())) => MqttTestResponse {
                reachable: true,
                elapsed_ms,
                error: None,
            },
            Ok(Err(message)) => MqttTestResponse {
                reachable: false,
                elapsed_ms,
                error: Some(message),
            },
            Err(_) => MqttTestResponse {
                reachable: false,
                elapsed_ms,
                error: Some(format!(
                    "No broker response within {} seconds",
                    self.inner.config.test_timeout_secs
                )),
            },
        }
    }
}

fn broker_options(source: &ExternalMqttSource, config: &MqttConfig, purpose: &str) -> MqttOptions {
    let client_id = format!("airwatch-{}-{}", purpose, Uuid::new_v4());
    let mut options = MqttOptions::new(client_id, source.host.clone(), source.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
    if let (Some(username), Some(password)) = (&source.username, &source.password) {
        options.set_credentials(username.clone(), password.clone());
    }
    options
}

/// The per-source subscriber loop. Runs until the shutdown signal flips.
async fn subscribe_loop(
    inner: Arc<Inner>,
    source: ExternalMqttSource,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let options = broker_options(&source, &inner.config, "sub");
    let (client, mut event_loop) = AsyncClient::new(options, inner.config.channel_capacity);
    let reconnect_delay = Duration::from_secs(inner.config.reconnect_delay_secs.max(1));

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    let _ = client.disconnect().await;
                    break;
                }
            }
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // (Re)connected; subscriptions do not survive reconnects
                    if let Err(e) = client.subscribe(source.topic.as_str(), QoS::AtLeastOnce).await {
                        warn!(source_id = %source.id, error = %e, "Subscribe request failed");
                    } else {
                        info!(source_id = %source.id, topic = %source.topic, "Subscribed");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    handle_publish(&inner, &source, &publish.payload).await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(source_id = %source.id, error = %e, "Broker connection error");
                    if let Err(db_err) = inner.sources.record_failure(&source.id).await {
                        warn!(source_id = %source.id, error = %db_err, "Failed to record failure");
                    }
                    tokio::time::sleep(reconnect_delay).await;
                }
            }
        }
    }
}

/// Parse, normalize and store one broker message. Failures are logged and
/// the message dropped; there is no retry or dead-letter path.
async fn handle_publish(inner: &Inner, source: &ExternalMqttSource, payload: &[u8]) {
    let value: serde_json::Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!(source_id = %source.id, error = %e, "Dropping unparseable payload");
            record_payload_dropped("invalid_json");
            return;
        }
    };

    let reading = match normalization::normalize_entity(&value, &source.station_id) {
        Ok(reading) => reading,
        Err(e) => {
            warn!(source_id = %source.id, error = %e, "Dropping unusable payload");
            record_payload_dropped("normalize");
            return;
        }
    };

    if let Err(e) = inner.readings.insert(&reading).await {
        warn!(source_id = %source.id, error = %e, "Failed to store reading");
        return;
    }
    record_reading_stored("mqtt");

    if let Err(e) = inner
        .sources
        .record_message(&source.id, shared::time::now())
        .await
    {
        warn!(source_id = %source.id, error = %e, "Failed to bump message counter");
    }

    inner.hub.publish(NEW_EXTERNAL_AIR_QUALITY, &reading);
    debug!(source_id = %source.id, reading_id = %reading.reading.id, "Stored MQTT reading");
}
