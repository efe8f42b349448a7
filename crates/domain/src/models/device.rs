//! Device domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Device power state, driven by on/off commands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::On => "on",
            PowerState::Off => "off",
        }
    }
}

/// A controllable device, optionally tied to a user and a station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(rename = "stationId", skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,

    pub state: PowerState,

    #[serde(
        rename = "lastCommandAt",
        default,
        with = "shared::time::canonical_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_command_at: Option<DateTime<Utc>>,

    #[serde(rename = "createdAt", with = "shared::time::canonical")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt", with = "shared::time::canonical")]
    pub updated_at: DateTime<Utc>,
}

/// Request payload for registering a device.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub user_id: Option<String>,
    pub station_id: Option<String>,
}

impl RegisterDeviceRequest {
    pub fn into_document(self) -> Device {
        let now = shared::time::now();
        Device {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            user_id: self.user_id,
            station_id: self.station_id,
            state: PowerState::Off,
            last_command_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request payload for issuing an on/off command.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCommandRequest {
    pub command: PowerState,
}
