//! Air-quality reading document model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ngsi::{
    reading_urn, DateTimeProperty, GeoProperty, NumericProperty, Pollutant, Relationship,
    AIR_QUALITY_OBSERVED, NGSI_CONTEXT,
};
use shared::validation;

/// A stored `AirQualityObserved` entity.
///
/// The document shape is the NGSI-LD entity itself; `_id` is the entity URN.
/// Pollutant attributes are optional because stations measure different
/// subsets of quantities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQuality {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "type", default = "default_entity_type")]
    pub entity_type: String,

    #[serde(rename = "@context", default = "default_context")]
    pub context: String,

    #[serde(rename = "stationId")]
    pub station_id: String,

    #[serde(rename = "dateObserved")]
    pub date_observed: DateTimeProperty,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoProperty>,

    #[serde(rename = "refDevice", skip_serializing_if = "Option::is_none")]
    pub ref_device: Option<Relationship>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub co: Option<NumericProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no: Option<NumericProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no2: Option<NumericProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nox: Option<NumericProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub o3: Option<NumericProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub so2: Option<NumericProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm1: Option<NumericProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm25: Option<NumericProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm10: Option<NumericProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<NumericProperty>,
    #[serde(rename = "relativeHumidity", skip_serializing_if = "Option::is_none")]
    pub relative_humidity: Option<NumericProperty>,
}

fn default_entity_type() -> String {
    AIR_QUALITY_OBSERVED.to_string()
}

fn default_context() -> String {
    NGSI_CONTEXT.to_string()
}

impl AirQuality {
    /// An empty reading for `station_id` observed at `observed`.
    pub fn empty(station_id: impl Into<String>, observed: DateTime<Utc>) -> Self {
        let station_id = station_id.into();
        Self {
            id: reading_urn(&station_id, observed),
            entity_type: default_entity_type(),
            context: default_context(),
            station_id,
            date_observed: DateTimeProperty::new(observed),
            location: None,
            ref_device: None,
            co: None,
            no: None,
            no2: None,
            nox: None,
            o3: None,
            so2: None,
            pm1: None,
            pm25: None,
            pm10: None,
            temperature: None,
            relative_humidity: None,
        }
    }

    pub fn pollutant(&self, pollutant: Pollutant) -> Option<&NumericProperty> {
        match pollutant {
            Pollutant::Co => self.co.as_ref(),
            Pollutant::No => self.no.as_ref(),
            Pollutant::No2 => self.no2.as_ref(),
            Pollutant::Nox => self.nox.as_ref(),
            Pollutant::O3 => self.o3.as_ref(),
            Pollutant::So2 => self.so2.as_ref(),
            Pollutant::Pm1 => self.pm1.as_ref(),
            Pollutant::Pm25 => self.pm25.as_ref(),
            Pollutant::Pm10 => self.pm10.as_ref(),
            Pollutant::Temperature => self.temperature.as_ref(),
            Pollutant::RelativeHumidity => self.relative_humidity.as_ref(),
        }
    }

    pub fn set_pollutant(&mut self, pollutant: Pollutant, property: NumericProperty) {
        let slot = match pollutant {
            Pollutant::Co => &mut self.co,
            Pollutant::No => &mut self.no,
            Pollutant::No2 => &mut self.no2,
            Pollutant::Nox => &mut self.nox,
            Pollutant::O3 => &mut self.o3,
            Pollutant::So2 => &mut self.so2,
            Pollutant::Pm1 => &mut self.pm1,
            Pollutant::Pm25 => &mut self.pm25,
            Pollutant::Pm10 => &mut self.pm10,
            Pollutant::Temperature => &mut self.temperature,
            Pollutant::RelativeHumidity => &mut self.relative_humidity,
        };
        *slot = Some(property);
    }

    /// Present pollutant attributes, in canonical order.
    pub fn measured(&self) -> Vec<(Pollutant, &NumericProperty)> {
        Pollutant::ALL
            .iter()
            .filter_map(|p| self.pollutant(*p).map(|prop| (*p, prop)))
            .collect()
    }

    pub fn has_measurements(&self) -> bool {
        Pollutant::ALL.iter().any(|p| self.pollutant(*p).is_some())
    }
}

/// Request body for storing a reading.
///
/// The body is the NGSI-LD entity; id, type, `@context` and `dateObserved`
/// are optional and filled server-side when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAirQualityRequest {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "stationId")]
    pub station_id: String,

    #[serde(rename = "dateObserved", default)]
    pub date_observed: Option<DateTimeProperty>,

    #[serde(default)]
    pub location: Option<GeoProperty>,

    #[serde(rename = "refDevice", default)]
    pub ref_device: Option<Relationship>,

    #[serde(default)]
    pub co: Option<NumericProperty>,
    #[serde(default)]
    pub no: Option<NumericProperty>,
    #[serde(default)]
    pub no2: Option<NumericProperty>,
    #[serde(default)]
    pub nox: Option<NumericProperty>,
    #[serde(default)]
    pub o3: Option<NumericProperty>,
    #[serde(default)]
    pub so2: Option<NumericProperty>,
    #[serde(default)]
    pub pm1: Option<NumericProperty>,
    #[serde(default)]
    pub pm25: Option<NumericProperty>,
    #[serde(default)]
    pub pm10: Option<NumericProperty>,
    #[serde(default)]
    pub temperature: Option<NumericProperty>,
    #[serde(rename = "relativeHumidity", default)]
    pub relative_humidity: Option<NumericProperty>,
}

impl CreateAirQualityRequest {
    /// Semantic validation beyond deserialization.
    pub fn check(&self) -> Result<(), String> {
        if self.station_id.trim().is_empty() {
            return Err("stationId must not be empty".to_string());
        }
        if let Some(geo) = &self.location {
            validation::validate_latitude(geo.value.latitude())
                .and_then(|_| validation::validate_longitude(geo.value.longitude()))
                .map_err(|e| e.message.map(|m| m.to_string()).unwrap_or_default())?;
        }
        for (pollutant, prop) in self.present_pollutants() {
            validation::validate_concentration(prop.value).map_err(|_| {
                format!("{}: value must be a non-negative finite number", pollutant.key())
            })?;
        }
        if self.present_pollutants().is_empty() {
            return Err("Reading carries no measured attributes".to_string());
        }
        Ok(())
    }

    fn present_pollutants(&self) -> Vec<(Pollutant, &NumericProperty)> {
        let slots = [
            (Pollutant::Co, &self.co),
            (Pollutant::No, &self.no),
            (Pollutant::No2, &self.no2),
            (Pollutant::Nox, &self.nox),
            (Pollutant::O3, &self.o3),
            (Pollutant::So2, &self.so2),
            (Pollutant::Pm1, &self.pm1),
            (Pollutant::Pm25, &self.pm25),
            (Pollutant::Pm10, &self.pm10),
            (Pollutant::Temperature, &self.temperature),
            (Pollutant::RelativeHumidity, &self.relative_humidity),
        ];
        slots
            .into_iter()
            .filter_map(|(p, slot)| slot.as_ref().map(|prop| (p, prop)))
            .collect()
    }

    /// Converts into a storable document, filling server-side defaults.
    pub fn into_document(self) -> AirQuality {
        let observed = self
            .date_observed
            .unwrap_or_else(DateTimeProperty::now);
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => reading_urn(&self.station_id, observed.value),
        };
        AirQuality {
            id,
            entity_type: default_entity_type(),
            context: default_context(),
            station_id: self.station_id,
            date_observed: observed,
            location: self.location,
            ref_device: self.ref_device,
            co: self.co,
            no: self.no,
            no2: self.no2,
            nox: self.nox,
            o3: self.o3,
            so2: self.so2,
            pm1: self.pm1,
            pm25: self.pm25,
            pm10: self.pm10,
            temperature: self.temperature,
            relative_humidity: self.relative_humidity,
        }
    }
}

/// Query parameters for listing readings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReadingsQuery {
    pub station_id: Option<String>,
    pub limit: Option<i64>,
}

/// Query parameters for the latest-reading endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestReadingQuery {
    pub station_id: String,
}

/// Query parameters for the history endpoints.
///
/// `from`/`to` arrive as RFC 3339 strings and are parsed in the handler so
/// malformed values produce a 400 rather than a rejection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub station_id: Option<String>,
    pub from: String,
    pub to: String,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// One page of history results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub readings: Vec<AirQuality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_request(station: &str) -> CreateAirQualityRequest {
        serde_json::from_value(serde_json::json!({
            "stationId": station,
            "pm25": {"type": "Property", "value": 12.0, "unitCode": "GQ"},
            "no2": {"value": 30.5}
        }))
        .unwrap()
    }

    #[test]
    fn test_document_serialization_shape() {
        let mut reading = AirQuality::empty(
            "ljubljana-center",
            Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap(),
        );
        reading.set_pollutant(Pollutant::Pm25, NumericProperty::with_unit(12.0, "GQ"));

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["type"], "AirQualityObserved");
        assert_eq!(json["stationId"], "ljubljana-center");
        assert_eq!(json["dateObserved"]["value"], "2024-05-01T06:00:00.000Z");
        assert_eq!(json["pm25"]["value"], 12.0);
        // Absent pollutants are omitted entirely
        assert!(json.get("co").is_none());
        // The URN carries station and epoch millis
        assert!(json["_id"]
            .as_str()
            .unwrap()
            .starts_with("urn:ngsi-ld:AirQualityObserved:ljubljana-center:"));
    }

    #[test]
    fn test_document_roundtrip() {
        let mut reading = AirQuality::empty("s1", Utc::now());
        reading.set_pollutant(Pollutant::O3, NumericProperty::new(61.0));
        reading.location = Some(GeoProperty::point(46.05, 14.51));

        let json = serde_json::to_string(&reading).unwrap();
        let back: AirQuality = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, reading.id);
        assert_eq!(back.o3, reading.o3);
        assert_eq!(back.location, reading.location);
    }

    #[test]
    fn test_create_request_fills_defaults() {
        let doc = sample_request("s1").into_document();
        assert!(doc.id.starts_with("urn:ngsi-ld:AirQualityObserved:s1:"));
        assert_eq!(doc.entity_type, "AirQualityObserved");
        assert_eq!(doc.context, NGSI_CONTEXT);
        assert!(doc.has_measurements());
    }

    #[test]
    fn test_create_request_keeps_client_id() {
        let mut request = sample_request("s1");
        request.id = Some("urn:ngsi-ld:AirQualityObserved:custom".to_string());
        let doc = request.into_document();
        assert_eq!(doc.id, "urn:ngsi-ld:AirQualityObserved:custom");
    }

    #[test]
    fn test_check_rejects_empty_station() {
        let request = sample_request("  ");
        assert!(request.check().unwrap_err().contains("stationId"));
    }

    #[test]
    fn test_check_rejects_negative_concentration() {
        let request: CreateAirQualityRequest = serde_json::from_value(serde_json::json!({
            "stationId": "s1",
            "pm10": {"value": -1.0}
        }))
        .unwrap();
        assert!(request.check().unwrap_err().contains("pm10"));
    }

    #[test]
    fn test_check_rejects_empty_reading() {
        let request: CreateAirQualityRequest =
            serde_json::from_value(serde_json::json!({"stationId": "s1"})).unwrap();
        assert!(request.check().unwrap_err().contains("no measured"));
    }

    #[test]
    fn test_check_rejects_out_of_range_location() {
        let mut request = sample_request("s1");
        request.location = Some(GeoProperty::point(95.0, 14.0));
        assert!(request.check().is_err());
    }

    #[test]
    fn test_measured_in_canonical_order() {
        let mut reading = AirQuality::empty("s1", Utc::now());
        reading.set_pollutant(Pollutant::Pm10, NumericProperty::new(40.0));
        reading.set_pollutant(Pollutant::Co, NumericProperty::new(0.3));

        let measured = reading.measured();
        assert_eq!(measured.len(), 2);
        assert_eq!(measured[0].0, Pollutant::Co);
        assert_eq!(measured[1].0, Pollutant::Pm10);
    }
}
