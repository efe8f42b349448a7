//! External MQTT source domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A registered MQTT broker subscription feeding readings for one station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalMqttSource {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "stationId")]
    pub station_id: String,

    pub name: String,
    pub host: String,
    pub port: u16,
    pub topic: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    pub active: bool,

    /// Messages stored since registration. Display counter only; it makes
    /// no correctness claim about delivery.
    #[serde(rename = "messageCount", default)]
    pub message_count: u64,

    /// Consecutive connection failures since the last successful message.
    #[serde(rename = "failureCount", default)]
    pub failure_count: u32,

    #[serde(
        rename = "lastMessageAt",
        default,
        with = "shared::time::canonical_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_message_at: Option<DateTime<Utc>>,

    #[serde(rename = "createdAt", with = "shared::time::canonical")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt", with = "shared::time::canonical")]
    pub updated_at: DateTime<Utc>,
}

fn default_port() -> u16 {
    1883
}

/// Request payload for registering an MQTT source.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMqttSourceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 253, message = "Host must be 1-253 characters"))]
    pub host: String,

    #[serde(default = "default_port")]
    #[validate(custom(function = "shared::validation::validate_port"))]
    pub port: u16,

    #[validate(length(min = 1, max = 256, message = "Topic must be 1-256 characters"))]
    pub topic: String,

    pub username: Option<String>,
    pub password: Option<String>,

    pub station_name: Option<String>,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: Option<f64>,
}

impl CreateMqttSourceRequest {
    /// Builds the document; the caller supplies the station slug.
    pub fn into_document(self, station_id: String) -> ExternalMqttSource {
        let now = shared::time::now();
        ExternalMqttSource {
            id: Uuid::new_v4().to_string(),
            station_id,
            name: self.name,
            host: self.host,
            port: self.port,
            topic: self.topic,
            username: self.username,
            password: self.password,
            active: false,
            message_count: 0,
            failure_count: 0,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request payload for replacing an MQTT source (whole-document update).
///
/// Connection changes take effect on the next activate.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMqttSourceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 253, message = "Host must be 1-253 characters"))]
    pub host: String,

    #[validate(custom(function = "shared::validation::validate_port"))]
    pub port: u16,

    #[validate(length(min = 1, max = 256, message = "Topic must be 1-256 characters"))]
    pub topic: String,

    pub username: Option<String>,
    pub password: Option<String>,
}

impl UpdateMqttSourceRequest {
    /// Replacement document keeping identity, station link and counters.
    pub fn into_document(self, existing: &ExternalMqttSource) -> ExternalMqttSource {
        ExternalMqttSource {
            id: existing.id.clone(),
            station_id: existing.station_id.clone(),
            name: self.name,
            host: self.host,
            port: self.port,
            topic: self.topic,
            username: self.username,
            password: self.password,
            active: existing.active,
            message_count: existing.message_count,
            failure_count: existing.failure_count,
            last_message_at: existing.last_message_at,
            created_at: existing.created_at,
            updated_at: shared::time::now(),
        }
    }
}

/// Result of a broker connection probe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttTestResponse {
    pub reachable: bool,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
