//! External HTTP source domain model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A registered HTTP endpoint polled for NGSI-LD readings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSource {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "stationId")]
    pub station_id: String,

    pub name: String,
    pub url: String,

    #[serde(rename = "pollIntervalSecs")]
    pub poll_interval_secs: u64,

    /// Extra request headers sent with every poll (API keys and the like).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Consecutive failed polls. Reset on success and on reactivation.
    #[serde(rename = "failureCount", default)]
    pub failure_count: u32,

    pub active: bool,

    #[serde(
        rename = "lastPolledAt",
        default,
        with = "shared::time::canonical_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_polled_at: Option<DateTime<Utc>>,

    #[serde(
        rename = "lastSuccessAt",
        default,
        with = "shared::time::canonical_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_success_at: Option<DateTime<Utc>>,

    #[serde(rename = "createdAt", with = "shared::time::canonical")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt", with = "shared::time::canonical")]
    pub updated_at: DateTime<Utc>,
}

impl ExternalSource {
    /// Whether the source's own interval has elapsed since the last poll.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_polled_at {
            None => true,
            Some(last) => {
                now.signed_duration_since(last).num_seconds() >= self.poll_interval_secs as i64
            }
        }
    }
}

fn default_poll_interval() -> u64 {
    300
}

/// Request payload for registering an external source.
///
/// The station fields feed the auto-created station; when `stationName` is
/// absent the source name is reused.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExternalSourceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(custom(function = "shared::validation::validate_http_url"))]
    pub url: String,

    #[serde(default = "default_poll_interval")]
    #[validate(custom(function = "shared::validation::validate_poll_interval"))]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    pub station_name: Option<String>,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: Option<f64>,
}

impl CreateExternalSourceRequest {
    /// Builds the document; the caller supplies the station slug.
    pub fn into_document(self, station_id: String) -> ExternalSource {
        let now = shared::time::now();
        ExternalSource {
            id: Uuid::new_v4().to_string(),
            station_id,
            name: self.name,
            url: self.url,
            poll_interval_secs: self.poll_interval_secs,
            headers: self.headers,
            failure_count: 0,
            active: true,
            last_polled_at: None,
            last_success_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request payload for replacing an external source (whole-document update).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExternalSourceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(custom(function = "shared::validation::validate_http_url"))]
    pub url: String,

    #[validate(custom(function = "shared::validation::validate_poll_interval"))]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    pub active: bool,
}

impl UpdateExternalSourceRequest {
    /// Replacement document keeping identity, station link and counters.
    pub fn into_document(self, existing: &ExternalSource) -> ExternalSource {
        ExternalSource {
            id: existing.id.clone(),
            station_id: existing.station_id.clone(),
            name: self.name,
            url: self.url,
            poll_interval_secs: self.poll_interval_secs,
            headers: self.headers,
            failure_count: existing.failure_count,
            active: self.active,
            last_polled_at: existing.last_polled_at,
            last_success_at: existing.last_success_at,
            created_at: existing.created_at,
            updated_at: shared::time::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn sample() -> CreateExternalSourceRequest {
        serde_json::from_value(serde_json::json!({
            "name": "ARSO feed",
            "url": "https://example.org/airquality.json"
        }))
        .unwrap()
    }

    #[test]
    fn test_create_request_defaults() {
        let request = sample();
        assert_eq!(request.poll_interval_secs, 300);
        assert!(request.headers.is_empty());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_bad_url() {
        let request: CreateExternalSourceRequest = serde_json::from_value(serde_json::json!({
            "name": "bad",
            "url": "ftp://example.org/feed"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_request_rejects_short_interval() {
        let request: CreateExternalSourceRequest = serde_json::from_value(serde_json::json!({
            "name": "fast",
            "url": "https://example.org/feed",
            "pollIntervalSecs": 1
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_into_document_initial_state() {
        let source = sample().into_document("arso-feed".to_string());
        assert_eq!(source.station_id, "arso-feed");
        assert_eq!(source.failure_count, 0);
        assert!(source.active);
        assert!(source.last_polled_at.is_none());
        assert!(Uuid::parse_str(&source.id).is_ok());
    }

    #[test]
    fn test_is_due() {
        let mut source = sample().into_document("arso-feed".to_string());
        let now = shared::time::now();

        // Never polled: always due
        assert!(source.is_due(now));

        source.last_polled_at = Some(now - TimeDelta::seconds(301));
        assert!(source.is_due(now));

        source.last_polled_at = Some(now - TimeDelta::seconds(10));
        assert!(!source.is_due(now));
    }

    #[test]
    fn test_update_preserves_counters_and_identity() {
        let mut source = sample().into_document("arso-feed".to_string());
        source.failure_count = 3;

        let update: UpdateExternalSourceRequest = serde_json::from_value(serde_json::json!({
            "name": "ARSO feed v2",
            "url": "https://example.org/v2.json",
            "pollIntervalSecs": 600,
            "active": false
        }))
        .unwrap();

        let replaced = update.into_document(&source);
        assert_eq!(replaced.id, source.id);
        assert_eq!(replaced.station_id, "arso-feed");
        assert_eq!(replaced.failure_count, 3);
        assert_eq!(replaced.poll_interval_secs, 600);
        assert!(!replaced.active);
    }

    #[test]
    fn test_document_serialization() {
        let source = sample().into_document("arso-feed".to_string());
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["stationId"], "arso-feed");
        assert_eq!(json["failureCount"], 0);
        // Empty headers map and unset timestamps are omitted
        assert!(json.get("headers").is_none());
        assert!(json.get("lastPolledAt").is_none());
    }
}
