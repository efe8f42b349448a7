//! NGSI-LD value wrappers.
//!
//! Stored documents follow the FIWARE `AirQualityObserved` shape: scalar
//! values are wrapped in `Property` objects, coordinates in a `GeoProperty`
//! holding a GeoJSON point, and entity links in `Relationship` objects.
//! These types are the JSON/BSON shape of the reading collections; nothing
//! here interprets the data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `@context` stamped on stored entities.
pub const NGSI_CONTEXT: &str = "https://smartdatamodels.org/context.jsonld";

/// Entity type of air-quality readings.
pub const AIR_QUALITY_OBSERVED: &str = "AirQualityObserved";

/// Builds the NGSI-LD URN for a reading observed at `observed` for a station.
pub fn reading_urn(station_id: &str, observed: DateTime<Utc>) -> String {
    format!(
        "urn:ngsi-ld:{}:{}:{}",
        AIR_QUALITY_OBSERVED,
        station_id,
        observed.timestamp_millis()
    )
}

/// A numeric NGSI-LD property (pollutant concentration, temperature, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericProperty {
    #[serde(rename = "type", default = "property_type")]
    pub property_type: String,
    pub value: f64,
    #[serde(rename = "unitCode", skip_serializing_if = "Option::is_none")]
    pub unit_code: Option<String>,
}

impl NumericProperty {
    pub fn new(value: f64) -> Self {
        Self {
            property_type: property_type(),
            value,
            unit_code: None,
        }
    }

    pub fn with_unit(value: f64, unit_code: impl Into<String>) -> Self {
        Self {
            property_type: property_type(),
            value,
            unit_code: Some(unit_code.into()),
        }
    }
}

/// A timestamp NGSI-LD property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateTimeProperty {
    #[serde(rename = "type", default = "property_type")]
    pub property_type: String,
    #[serde(with = "shared::time::canonical")]
    pub value: DateTime<Utc>,
}

impl DateTimeProperty {
    pub fn new(value: DateTime<Utc>) -> Self {
        Self {
            property_type: property_type(),
            value: shared::time::truncate(value),
        }
    }

    /// Property stamped with the current time.
    pub fn now() -> Self {
        Self::new(shared::time::now())
    }
}

/// A GeoJSON point, `coordinates` in `[longitude, latitude]` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonPoint {
    #[serde(rename = "type", default = "point_type")]
    pub point_type: String,
    pub coordinates: [f64; 2],
}

impl GeoJsonPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            point_type: point_type(),
            coordinates: [longitude, latitude],
        }
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }
}

/// An NGSI-LD geo property wrapping a GeoJSON point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoProperty {
    #[serde(rename = "type", default = "geo_property_type")]
    pub property_type: String,
    pub value: GeoJsonPoint,
}

impl GeoProperty {
    pub fn point(latitude: f64, longitude: f64) -> Self {
        Self {
            property_type: geo_property_type(),
            value: GeoJsonPoint::new(latitude, longitude),
        }
    }
}

/// An NGSI-LD relationship to another entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type", default = "relationship_type")]
    pub property_type: String,
    pub object: String,
}

impl Relationship {
    pub fn to(object: impl Into<String>) -> Self {
        Self {
            property_type: relationship_type(),
            object: object.into(),
        }
    }
}

fn property_type() -> String {
    "Property".to_string()
}

fn geo_property_type() -> String {
    "GeoProperty".to_string()
}

fn relationship_type() -> String {
    "Relationship".to_string()
}

fn point_type() -> String {
    "Point".to_string()
}

/// Measured quantities a reading may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pollutant {
    Co,
    No,
    No2,
    Nox,
    O3,
    So2,
    Pm1,
    Pm25,
    Pm10,
    Temperature,
    RelativeHumidity,
}

impl Pollutant {
    /// All supported quantities, in CSV column order.
    pub const ALL: [Pollutant; 11] = [
        Pollutant::Co,
        Pollutant::No,
        Pollutant::No2,
        Pollutant::Nox,
        Pollutant::O3,
        Pollutant::So2,
        Pollutant::Pm1,
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::Temperature,
        Pollutant::RelativeHumidity,
    ];

    /// The canonical NGSI-LD attribute name.
    pub fn key(&self) -> &'static str {
        match self {
            Pollutant::Co => "co",
            Pollutant::No => "no",
            Pollutant::No2 => "no2",
            Pollutant::Nox => "nox",
            Pollutant::O3 => "o3",
            Pollutant::So2 => "so2",
            Pollutant::Pm1 => "pm1",
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::Temperature => "temperature",
            Pollutant::RelativeHumidity => "relativeHumidity",
        }
    }

    /// Maps a payload field name to a quantity, tolerating the common
    /// spellings seen on public broker feeds.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "co" | "CO" => Some(Pollutant::Co),
            "no" | "NO" => Some(Pollutant::No),
            "no2" | "NO2" => Some(Pollutant::No2),
            "nox" | "NOx" | "NOX" => Some(Pollutant::Nox),
            "o3" | "O3" => Some(Pollutant::O3),
            "so2" | "SO2" => Some(Pollutant::So2),
            "pm1" | "PM1" => Some(Pollutant::Pm1),
            "pm25" | "pm2_5" | "pm2.5" | "PM25" | "PM2.5" => Some(Pollutant::Pm25),
            "pm10" | "PM10" => Some(Pollutant::Pm10),
            "temperature" | "temp" => Some(Pollutant::Temperature),
            "relativeHumidity" | "humidity" | "rh" => Some(Pollutant::RelativeHumidity),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_numeric_property_serialization() {
        let prop = NumericProperty::with_unit(12.5, "GQ");
        let json = serde_json::to_value(&prop).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "Property", "value": 12.5, "unitCode": "GQ"})
        );
    }

    #[test]
    fn test_numeric_property_unit_skipped_when_absent() {
        let json = serde_json::to_string(&NumericProperty::new(3.0)).unwrap();
        assert!(!json.contains("unitCode"));
    }

    #[test]
    fn test_numeric_property_deserialization_defaults_type() {
        let prop: NumericProperty = serde_json::from_str(r#"{"value": 7.25}"#).unwrap();
        assert_eq!(prop.property_type, "Property");
        assert_eq!(prop.value, 7.25);
    }

    #[test]
    fn test_datetime_property_canonical_value() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
        let json = serde_json::to_value(DateTimeProperty::new(ts)).unwrap();
        assert_eq!(json["value"], "2024-05-01T06:00:00.000Z");
    }

    #[test]
    fn test_geo_point_coordinate_order() {
        // GeoJSON is [lon, lat]
        let point = GeoJsonPoint::new(46.05, 14.51);
        assert_eq!(point.coordinates, [14.51, 46.05]);
        assert_eq!(point.latitude(), 46.05);
        assert_eq!(point.longitude(), 14.51);
    }

    #[test]
    fn test_geo_property_serialization() {
        let geo = GeoProperty::point(46.05, 14.51);
        let json = serde_json::to_value(&geo).unwrap();
        assert_eq!(json["type"], "GeoProperty");
        assert_eq!(json["value"]["type"], "Point");
        assert_eq!(json["value"]["coordinates"][0], 14.51);
    }

    #[test]
    fn test_relationship() {
        let rel = Relationship::to("urn:ngsi-ld:Device:aw-017");
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "Relationship");
        assert_eq!(json["object"], "urn:ngsi-ld:Device:aw-017");
    }

    #[test]
    fn test_reading_urn() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
        assert_eq!(
            reading_urn("ljubljana-center", ts),
            format!(
                "urn:ngsi-ld:AirQualityObserved:ljubljana-center:{}",
                ts.timestamp_millis()
            )
        );
    }

    #[test]
    fn test_pollutant_keys_roundtrip() {
        for pollutant in Pollutant::ALL {
            assert_eq!(Pollutant::from_key(pollutant.key()), Some(pollutant));
        }
    }

    #[test]
    fn test_pollutant_aliases() {
        assert_eq!(Pollutant::from_key("pm2_5"), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_key("PM2.5"), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_key("rh"), Some(Pollutant::RelativeHumidity));
        assert_eq!(Pollutant::from_key("temp"), Some(Pollutant::Temperature));
        assert_eq!(Pollutant::from_key("radon"), None);
    }
}
