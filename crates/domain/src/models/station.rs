//! Station domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// How a station's readings reach the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StationKind {
    Official,
    ExternalHttp,
    ExternalMqtt,
    Contributed,
}

impl StationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationKind::Official => "official",
            StationKind::ExternalHttp => "external-http",
            StationKind::ExternalMqtt => "external-mqtt",
            StationKind::Contributed => "contributed",
        }
    }
}

/// A monitoring point. `_id` is a slug derived from the name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub kind: StationKind,
    pub active: bool,

    /// OpenAQ location id, when the station mirrors an OpenAQ feed.
    #[serde(rename = "openaqId", skip_serializing_if = "Option::is_none")]
    pub openaq_id: Option<String>,

    #[serde(rename = "createdAt", with = "shared::time::canonical")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt", with = "shared::time::canonical")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

fn default_kind() -> StationKind {
    StationKind::Official
}

/// Request payload for creating a station.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStationRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[serde(default = "default_kind")]
    pub kind: StationKind,

    #[serde(default = "default_active")]
    pub active: bool,

    pub openaq_id: Option<String>,
}

impl CreateStationRequest {
    /// Builds the document; the caller supplies the collision-checked slug.
    pub fn into_document(self, id: String) -> Station {
        let now = shared::time::now();
        Station {
            id,
            name: self.name,
            latitude: self.latitude,
            longitude: self.longitude,
            kind: self.kind,
            active: self.active,
            openaq_id: self.openaq_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request payload for replacing a station (whole-document update).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStationRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    pub kind: StationKind,
    pub active: bool,
    pub openaq_id: Option<String>,
}

impl UpdateStationRequest {
    /// Replacement document keeping identity and creation time.
    pub fn into_document(self, existing: &Station) -> Station {
        Station {
            id: existing.id.clone(),
            name: self.name,
            latitude: self.latitude,
            longitude: self.longitude,
            kind: self.kind,
            active: self.active,
            openaq_id: self.openaq_id,
            created_at: existing.created_at,
            updated_at: shared::time::now(),
        }
    }
}

/// Query parameters for listing stations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStationsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Compact station shape for the map endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStation {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub kind: StationKind,
}

impl From<Station> for MapStation {
    fn from(s: Station) -> Self {
        Self {
            id: s.id,
            name: s.name,
            latitude: s.latitude,
            longitude: s.longitude,
            kind: s.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&StationKind::ExternalMqtt).unwrap(),
            "\"external-mqtt\""
        );
        let kind: StationKind = serde_json::from_str("\"external-http\"").unwrap();
        assert_eq!(kind, StationKind::ExternalHttp);
    }

    #[test]
    fn test_create_request_defaults() {
        let request: CreateStationRequest = serde_json::from_str(
            r#"{"name": "Ljubljana Center", "latitude": 46.05, "longitude": 14.51}"#,
        )
        .unwrap();
        assert_eq!(request.kind, StationKind::Official);
        assert!(request.active);
        assert!(request.openaq_id.is_none());
    }

    #[test]
    fn test_create_request_validation() {
        let request: CreateStationRequest = serde_json::from_str(
            r#"{"name": "", "latitude": 95.0, "longitude": 14.51}"#,
        )
        .unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("latitude"));
    }

    #[test]
    fn test_into_document_stamps_timestamps() {
        let request: CreateStationRequest = serde_json::from_str(
            r#"{"name": "Celje", "latitude": 46.23, "longitude": 15.26}"#,
        )
        .unwrap();
        let station = request.into_document("celje".to_string());
        assert_eq!(station.id, "celje");
        assert_eq!(station.created_at, station.updated_at);
    }

    #[test]
    fn test_update_preserves_identity() {
        let create: CreateStationRequest = serde_json::from_str(
            r#"{"name": "Celje", "latitude": 46.23, "longitude": 15.26}"#,
        )
        .unwrap();
        let station = create.into_document("celje".to_string());

        let update: UpdateStationRequest = serde_json::from_str(
            r#"{"name": "Celje Center", "latitude": 46.24, "longitude": 15.27,
                "kind": "official", "active": false, "openaqId": null}"#,
        )
        .unwrap();
        let replaced = update.into_document(&station);
        assert_eq!(replaced.id, "celje");
        assert_eq!(replaced.created_at, station.created_at);
        assert_eq!(replaced.name, "Celje Center");
        assert!(!replaced.active);
    }

    #[test]
    fn test_document_serialization_uses_mongo_id() {
        let create: CreateStationRequest = serde_json::from_str(
            r#"{"name": "Koper", "latitude": 45.55, "longitude": 13.73}"#,
        )
        .unwrap();
        let json = serde_json::to_value(create.into_document("koper".to_string())).unwrap();
        assert_eq!(json["_id"], "koper");
        assert_eq!(json["kind"], "official");
        assert!(json.get("openaqId").is_none());
    }

    #[test]
    fn test_map_station_from_station() {
        let create: CreateStationRequest = serde_json::from_str(
            r#"{"name": "Koper", "latitude": 45.55, "longitude": 13.73}"#,
        )
        .unwrap();
        let map: MapStation = create.into_document("koper".to_string()).into();
        assert_eq!(map.id, "koper");
        assert_eq!(map.latitude, 45.55);
    }
}
