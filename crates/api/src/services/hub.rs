//! WebSocket event hub.
//!
//! Every accepted reading is rebroadcast to connected browser clients as a
//! named event. The hub is a bounded `broadcast` channel: subscribers that
//! fall behind skip messages instead of applying backpressure to ingestion.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Event name for readings stored through the REST endpoint.
pub const NEW_AIR_QUALITY: &str = "NewAirQualityData";

/// Event name for readings ingested from external sources (HTTP or MQTT).
pub const NEW_EXTERNAL_AIR_QUALITY: &str = "NewExternalAirQualityData";

/// Event name for readings uploaded under a contribution.
pub const NEW_CONTRIBUTED_AIR_QUALITY: &str = "NewContributedAirQualityData";

/// A named event with its JSON payload, as sent to hub subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct HubEvent {
    pub event: String,
    pub data: serde_json::Value,
}

/// Fan-out point for newly stored readings.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<HubEvent>,
}

impl EventHub {
    /// Creates a hub with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Fire-and-forget: with no subscribers the event is
    /// discarded.
    pub fn publish<T: Serialize>(&self, event: &str, data: &T) {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                debug!(event = event, error = %e, "Skipping unserializable hub event");
                return;
            }
        };
        let _ = self.tx.send(HubEvent {
            event: event.to_string(),
            data,
        });
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.tx.subscribe()
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
