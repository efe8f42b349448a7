//! CSV export of reading collections.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use domain::models::ngsi::Pollutant;
use domain::models::{AirQuality, ContributedAirQuality};

/// Renders readings as CSV: identity and location columns followed by one
/// column per supported quantity. Missing measurements are empty cells.
pub fn readings_to_csv(readings: &[AirQuality]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = vec!["id", "stationId", "dateObserved", "latitude", "longitude"];
    header.extend(Pollutant::ALL.iter().map(|p| p.key()));
    writer.write_record(&header)?;

    for reading in readings {
        writer.write_record(reading_record(reading, None))?;
    }

    Ok(writer.into_inner()?)
}

/// Renders contributed readings; same columns plus the contribution id.
pub fn contributed_to_csv(readings: &[ContributedAirQuality]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = vec![
        "id",
        "stationId",
        "dateObserved",
        "latitude",
        "longitude",
        "contributionId",
    ];
    header.extend(Pollutant::ALL.iter().map(|p| p.key()));
    writer.write_record(&header)?;

    for contributed in readings {
        writer.write_record(reading_record(
            &contributed.reading,
            Some(&contributed.contribution_id),
        ))?;
    }

    Ok(writer.into_inner()?)
}

fn reading_record(reading: &AirQuality, contribution_id: Option<&str>) -> Vec<String> {
    let (latitude, longitude) = match &reading.location {
        Some(geo) => (
            geo.value.latitude().to_string(),
            geo.value.longitude().to_string(),
        ),
        None => (String::new(), String::new()),
    };

    let mut record = vec![
        reading.id.clone(),
        reading.station_id.clone(),
        shared::time::to_canonical(reading.date_observed.value),
        latitude,
        longitude,
    ];
    if let Some(id) = contribution_id {
        record.push(id.to_string());
    }
    for pollutant in Pollutant::ALL {
        record.push(
            reading
                .pollutant(pollutant)
                .map(|p| p.value.to_string())
                .unwrap_or_default(),
        );
    }
    record
}

/// Wraps CSV bytes in an attachment response.
pub fn csv_attachment(filename: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use domain::models::ngsi::{GeoProperty, NumericProperty};

    fn sample_reading() -> AirQuality {
        let mut reading = AirQuality::empty(
            "ljubljana-center",
            Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap(),
        );
        reading.set_pollutant(Pollutant::Pm25, NumericProperty::new(12.5));
        reading.set_pollutant(Pollutant::No2, NumericProperty::new(30.0));
        reading.location = Some(GeoProperty::point(46.05, 14.51));
        reading
    }

    #[test]
    fn test_csv_header_and_row() {
        let bytes = readings_to_csv(&[sample_reading()]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("id,stationId,dateObserved,latitude,longitude,co,"));
        assert!(header.ends_with("relativeHumidity"));

        let row = lines.next().unwrap();
        assert!(row.contains("ljubljana-center"));
        assert!(row.contains("2024-05-01T06:00:00.000Z"));
        assert!(row.contains("12.5"));
        assert!(row.contains("46.05"));
    }

    #[test]
    fn test_csv_missing_values_are_empty_cells() {
        let mut reading = sample_reading();
        reading.location = None;
        let bytes = readings_to_csv(&[reading]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let row = text.lines().nth(1).unwrap();
        let cells: Vec<&str> = row.split(',').collect();
        // latitude and longitude cells are empty
        assert_eq!(cells[3], "");
        assert_eq!(cells[4], "");
        // One cell per header column
        assert_eq!(cells.len(), 5 + Pollutant::ALL.len());
    }

    #[test]
    fn test_contributed_csv_carries_contribution_id() {
        let contributed = ContributedAirQuality {
            reading: sample_reading(),
            user_id: "u-1".to_string(),
            contribution_id: "c-42".to_string(),
        };
        let bytes = contributed_to_csv(&[contributed]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.lines().next().unwrap().contains("contributionId"));
        assert!(text.lines().nth(1).unwrap().contains("c-42"));
    }

    #[test]
    fn test_empty_export_is_header_only() {
        let bytes = readings_to_csv(&[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_attachment_headers() {
        let response = csv_attachment("history.csv", b"id\n".to_vec());
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.contains("history.csv"));
    }
}
