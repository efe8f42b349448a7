//! Payload normalization for the ingestion paths.
//!
//! Both the MQTT subscriber and the HTTP poller hand arbitrary JSON to this
//! module and get storable [`ExternalAirQuality`] documents back. Recognized
//! pollutant fields become NGSI-LD numeric properties; everything else is
//! preserved verbatim in the extension map. A payload that yields no
//! recognized measurement is rejected and dropped by the caller.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::models::air_quality::AirQuality;
use crate::models::external_air_quality::ExternalAirQuality;
use crate::models::ngsi::{GeoProperty, NumericProperty, Pollutant};

/// Error type for payload normalization.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("Payload is not a JSON object or array of objects")]
    NotAnObject,

    #[error("Payload carries no recognized measurement")]
    NoMeasurements,

    #[error("Unparseable timestamp: {0}")]
    BadTimestamp(String),
}

/// Fields consumed structurally rather than as measurements or extras.
const STRUCTURAL_KEYS: [&str; 7] = [
    "id",
    "type",
    "@context",
    "stationId",
    "dateObserved",
    "observedAt",
    "timestamp",
];

/// Result of normalizing a multi-entity payload.
#[derive(Debug)]
pub struct NormalizedBatch {
    pub readings: Vec<ExternalAirQuality>,
    /// Array elements that failed normalization and were dropped.
    pub dropped: usize,
}

/// Normalizes a payload that may be a single entity or an array of entities.
///
/// Array elements that fail individually are counted in `dropped` rather
/// than failing the batch; an entirely unusable payload is an error.
pub fn normalize_payload(
    payload: &Value,
    station_id: &str,
) -> Result<NormalizedBatch, NormalizeError> {
    match payload {
        Value::Array(items) => {
            let mut readings = Vec::new();
            let mut dropped = 0;
            for item in items {
                match normalize_entity(item, station_id) {
                    Ok(reading) => readings.push(reading),
                    Err(_) => dropped += 1,
                }
            }
            if readings.is_empty() {
                return Err(NormalizeError::NoMeasurements);
            }
            Ok(NormalizedBatch { readings, dropped })
        }
        Value::Object(_) => {
            let reading = normalize_entity(payload, station_id)?;
            Ok(NormalizedBatch {
                readings: vec![reading],
                dropped: 0,
            })
        }
        _ => Err(NormalizeError::NotAnObject),
    }
}

/// Normalizes a single JSON object into a reading for `station_id`.
pub fn normalize_entity(
    payload: &Value,
    station_id: &str,
) -> Result<ExternalAirQuality, NormalizeError> {
    let object = payload.as_object().ok_or(NormalizeError::NotAnObject)?;

    let observed = extract_observed(object)?.unwrap_or_else(shared::time::now);
    let mut reading = AirQuality::empty(station_id, observed);
    let mut external = ExternalAirQuality::from_reading(reading.clone());

    let mut recognized = 0usize;

    for (key, value) in object {
        if STRUCTURAL_KEYS.contains(&key.as_str()) {
            continue;
        }
        if key == "location" {
            if let Some(geo) = extract_location(value) {
                reading.location = Some(geo);
                continue;
            }
            // Unusable location shapes fall through to the extension map
        }
        if let Some(pollutant) = Pollutant::from_key(key) {
            if let Some(property) = extract_numeric(value) {
                reading.set_pollutant(pollutant, property);
                recognized += 1;
                continue;
            }
        }
        external.extra.insert(key.clone(), value.clone());
    }

    if recognized == 0 {
        return Err(NormalizeError::NoMeasurements);
    }

    external.reading = reading;
    Ok(external)
}

/// Pulls the observation time out of `dateObserved` / `observedAt` /
/// `timestamp`, accepting both plain strings and NGSI property wrappers.
fn extract_observed(
    object: &serde_json::Map<String, Value>,
) -> Result<Option<DateTime<Utc>>, NormalizeError> {
    let candidate = object
        .get("dateObserved")
        .or_else(|| object.get("observedAt"))
        .or_else(|| object.get("timestamp"));

    let Some(value) = candidate else {
        return Ok(None);
    };

    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => match map.get("value") {
            Some(Value::String(s)) => s.as_str(),
            _ => return Err(NormalizeError::BadTimestamp(value.to_string())),
        },
        _ => return Err(NormalizeError::BadTimestamp(value.to_string())),
    };

    shared::time::parse_canonical(raw)
        .map(Some)
        .map_err(|_| NormalizeError::BadTimestamp(raw.to_string()))
}

/// Accepts `12.5`, `{"value": 12.5}` and `{"value": 12.5, "unitCode": "GQ"}`.
/// Negative and non-finite values are rejected so they land in the
/// extension map instead of poisoning the measurement fields.
fn extract_numeric(value: &Value) -> Option<NumericProperty> {
    let (number, unit) = match value {
        Value::Number(n) => (n.as_f64()?, None),
        Value::Object(map) => {
            let number = map.get("value")?.as_f64()?;
            let unit = map
                .get("unitCode")
                .and_then(Value::as_str)
                .map(str::to_string);
            (number, unit)
        }
        _ => return None,
    };

    if !number.is_finite() || number < 0.0 {
        return None;
    }

    Some(match unit {
        Some(unit) => NumericProperty::with_unit(number, unit),
        None => NumericProperty::new(number),
    })
}

/// Accepts a GeoJSON point, an NGSI geo property, or `{lat(...), lon(...)}`
/// coordinate pairs.
fn extract_location(value: &Value) -> Option<GeoProperty> {
    // NGSI wrapper: {"type": "GeoProperty", "value": {...}}
    if let Some(inner) = value.get("value") {
        return extract_location(inner);
    }

    if let Some(coords) = value.get("coordinates").and_then(Value::as_array) {
        let lon = coords.first()?.as_f64()?;
        let lat = coords.get(1)?.as_f64()?;
        return checked_point(lat, lon);
    }

    let lat = value
        .get("latitude")
        .or_else(|| value.get("lat"))?
        .as_f64()?;
    let lon = value
        .get("longitude")
        .or_else(|| value.get("lng"))
        .or_else(|| value.get("lon"))?
        .as_f64()?;
    checked_point(lat, lon)
}

fn checked_point(lat: f64, lon: f64) -> Option<GeoProperty> {
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Some(GeoProperty::point(lat, lon))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_sensor_payload() {
        let payload = json!({
            "pm2_5": 14.2,
            "pm10": 21.0,
            "temp": 18.5,
            "batteryVoltage": 3.7
        });

        let reading = normalize_entity(&payload, "ext-7").unwrap();
        assert_eq!(reading.reading.station_id, "ext-7");
        assert_eq!(reading.reading.pm25.as_ref().unwrap().value, 14.2);
        assert_eq!(reading.reading.pm10.as_ref().unwrap().value, 21.0);
        assert_eq!(reading.reading.temperature.as_ref().unwrap().value, 18.5);
        // Unrecognized field preserved
        assert_eq!(reading.extra["batteryVoltage"], 3.7);
    }

    #[test]
    fn test_ngsi_entity_payload() {
        let payload = json!({
            "id": "urn:ngsi-ld:AirQualityObserved:upstream:1",
            "type": "AirQualityObserved",
            "dateObserved": {"type": "Property", "value": "2024-05-01T06:00:00.000Z"},
            "no2": {"type": "Property", "value": 31.0, "unitCode": "GQ"},
            "location": {
                "type": "GeoProperty",
                "value": {"type": "Point", "coordinates": [14.51, 46.05]}
            }
        });

        let reading = normalize_entity(&payload, "ext-7").unwrap();
        // The upstream id is structural; ours is minted from station + time
        assert!(reading.reading.id.contains("ext-7"));
        assert_eq!(
            shared::time::to_canonical(reading.reading.date_observed.value),
            "2024-05-01T06:00:00.000Z"
        );
        let no2 = reading.reading.no2.as_ref().unwrap();
        assert_eq!(no2.value, 31.0);
        assert_eq!(no2.unit_code.as_deref(), Some("GQ"));
        let location = reading.reading.location.as_ref().unwrap();
        assert_eq!(location.value.latitude(), 46.05);
    }

    #[test]
    fn test_lat_lng_location() {
        let payload = json!({
            "pm25": 8.0,
            "location": {"lat": 46.05, "lng": 14.51}
        });
        let reading = normalize_entity(&payload, "s").unwrap();
        assert_eq!(reading.reading.location.as_ref().unwrap().value.longitude(), 14.51);
    }

    #[test]
    fn test_out_of_range_location_goes_to_extras() {
        let payload = json!({
            "pm25": 8.0,
            "location": {"lat": 120.0, "lng": 14.51}
        });
        let reading = normalize_entity(&payload, "s").unwrap();
        assert!(reading.reading.location.is_none());
        assert!(reading.extra.contains_key("location"));
    }

    #[test]
    fn test_negative_value_not_a_measurement() {
        let payload = json!({"pm25": -4.0, "pm10": 10.0});
        let reading = normalize_entity(&payload, "s").unwrap();
        assert!(reading.reading.pm25.is_none());
        assert_eq!(reading.extra["pm25"], -4.0);
        assert_eq!(reading.reading.pm10.as_ref().unwrap().value, 10.0);
    }

    #[test]
    fn test_no_measurements_rejected() {
        let payload = json!({"status": "ok", "uptime": 12345});
        assert_eq!(
            normalize_entity(&payload, "s").unwrap_err(),
            NormalizeError::NoMeasurements
        );
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(
            normalize_entity(&json!("just a string"), "s").unwrap_err(),
            NormalizeError::NotAnObject
        );
        assert_eq!(
            normalize_payload(&json!(42), "s").unwrap_err(),
            NormalizeError::NotAnObject
        );
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let payload = json!({"pm25": 5.0, "timestamp": "yesterday-ish"});
        assert!(matches!(
            normalize_entity(&payload, "s").unwrap_err(),
            NormalizeError::BadTimestamp(_)
        ));
    }

    #[test]
    fn test_missing_timestamp_stamps_now() {
        let before = shared::time::now();
        let reading = normalize_entity(&json!({"pm25": 5.0}), "s").unwrap();
        let after = shared::time::now();
        let observed = reading.reading.date_observed.value;
        assert!(observed >= before && observed <= after);
    }

    #[test]
    fn test_array_payload_drops_bad_elements() {
        let payload = json!([
            {"pm25": 5.0},
            {"status": "ok"},
            {"o3": 61.2}
        ]);
        let batch = normalize_payload(&payload, "s").unwrap();
        assert_eq!(batch.readings.len(), 2);
        assert_eq!(batch.dropped, 1);
    }

    #[test]
    fn test_array_of_garbage_rejected() {
        let payload = json!([{"status": "ok"}, {"another": true}]);
        assert_eq!(
            normalize_payload(&payload, "s").unwrap_err(),
            NormalizeError::NoMeasurements
        );
    }
}
