//! Air-quality reading endpoint handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::TimeDelta;
use tracing::info;

use domain::models::air_quality::{
    CreateAirQualityRequest, HistoryPage, HistoryQuery, LatestReadingQuery, ListReadingsQuery,
};
use domain::models::AirQuality;
use persistence::repositories::AirQualityRepository;
use shared::pagination::{decode_cursor, encode_cursor};
use shared::{time, validation};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_reading_stored;
use crate::services::export;
use crate::services::hub::NEW_AIR_QUALITY;

/// Validated history window plus paging inputs.
struct HistoryFilter {
    station_id: Option<String>,
    from: chrono::DateTime<chrono::Utc>,
    to: chrono::DateTime<chrono::Utc>,
    after: Option<(chrono::DateTime<chrono::Utc>, String)>,
    limit: i64,
}

fn parse_history_query(query: &HistoryQuery, state: &AppState) -> Result<HistoryFilter, ApiError> {
    let from = time::parse_canonical(&query.from)
        .map_err(|_| ApiError::Validation("'from' is not a valid RFC 3339 timestamp".into()))?;
    let to = time::parse_canonical(&query.to)
        .map_err(|_| ApiError::Validation("'to' is not a valid RFC 3339 timestamp".into()))?;

    validation::validate_observation_window(from, to)
        .map_err(|e| ApiError::Validation(e.message.map(|m| m.to_string()).unwrap_or_default()))?;

    let max_range = TimeDelta::days(state.config.limits.history_max_range_days);
    if to - from > max_range {
        return Err(ApiError::Validation(format!(
            "History window exceeds the maximum of {} days",
            state.config.limits.history_max_range_days
        )));
    }

    let after = match &query.cursor {
        Some(cursor) => Some(
            decode_cursor(cursor).map_err(|e| ApiError::Validation(format!("Bad cursor: {}", e)))?,
        ),
        None => None,
    };

    let limit = clamp_limit(query.limit, state);

    Ok(HistoryFilter {
        station_id: query.station_id.clone(),
        from,
        to,
        after,
        limit,
    })
}

fn clamp_limit(requested: Option<i64>, state: &AppState) -> i64 {
    requested
        .unwrap_or(state.config.limits.default_page_size)
        .clamp(1, state.config.limits.max_page_size)
}

/// List recent readings, newest first.
///
/// GET /api/airquality?stationId=&limit=
pub async fn list_readings(
    State(state): State<AppState>,
    Query(query): Query<ListReadingsQuery>,
) -> Result<Json<Vec<AirQuality>>, ApiError> {
    let limit = clamp_limit(query.limit, &state);
    let repo = AirQualityRepository::new(state.db.clone());
    let readings = repo.find_recent(query.station_id.as_deref(), limit).await?;
    Ok(Json(readings))
}

/// Store a reading.
///
/// POST /api/airquality
pub async fn create_reading(
    State(state): State<AppState>,
    Json(request): Json<CreateAirQualityRequest>,
) -> Result<(StatusCode, Json<AirQuality>), ApiError> {
    request.check().map_err(ApiError::Validation)?;

    let reading = request.into_document();
    let repo = AirQualityRepository::new(state.db.clone());
    repo.insert(&reading).await?;
    record_reading_stored("rest");

    state.hub.publish(NEW_AIR_QUALITY, &reading);

    info!(
        reading_id = %reading.id,
        station_id = %reading.station_id,
        "Reading stored"
    );

    Ok((StatusCode::CREATED, Json(reading)))
}

/// Newest reading for a station.
///
/// GET /api/airquality/latest?stationId=
pub async fn latest_reading(
    State(state): State<AppState>,
    Query(query): Query<LatestReadingQuery>,
) -> Result<Json<AirQuality>, ApiError> {
    let repo = AirQualityRepository::new(state.db.clone());
    let reading = repo
        .latest_for_station(&query.station_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No readings for station".to_string()))?;
    Ok(Json(reading))
}

/// One page of history within a time window.
///
/// GET /api/airquality/history?stationId=&from=&to=&cursor=&limit=
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    let filter = parse_history_query(&query, &state)?;

    let repo = AirQualityRepository::new(state.db.clone());
    // One extra row decides whether another page exists
    let mut readings = repo
        .history(
            filter.station_id.as_deref(),
            filter.from,
            filter.to,
            filter.after,
            filter.limit + 1,
        )
        .await?;

    let next_cursor = if readings.len() as i64 > filter.limit {
        readings.truncate(filter.limit as usize);
        readings
            .last()
            .map(|last| encode_cursor(last.date_observed.value, &last.id))
    } else {
        None
    };

    let count = readings.len();
    Ok(Json(HistoryPage {
        readings,
        next_cursor,
        count,
    }))
}

/// History window as a CSV attachment.
///
/// GET /api/airquality/history/download?stationId=&from=&to=
pub async fn history_download(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let filter = parse_history_query(&query, &state)?;

    let repo = AirQualityRepository::new(state.db.clone());
    let readings = repo
        .history(
            filter.station_id.as_deref(),
            filter.from,
            filter.to,
            None,
            state.config.limits.max_export_rows,
        )
        .await?;

    let bytes = export::readings_to_csv(&readings)
        .map_err(|e| ApiError::Internal(format!("CSV export failed: {}", e)))?;

    info!(rows = readings.len(), "History exported");
    Ok(export::csv_attachment("air-quality-history.csv", bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_deserialization() {
        let query: ListReadingsQuery =
            serde_json::from_str(r#"{"stationId": "s1", "limit": 10}"#).unwrap();
        assert_eq!(query.station_id.as_deref(), Some("s1"));
        assert_eq!(query.limit, Some(10));

        let query: ListReadingsQuery = serde_json::from_str("{}").unwrap();
        assert!(query.station_id.is_none());
        assert!(query.limit.is_none());
    }

    #[test]
    fn test_history_query_deserialization() {
        let query: HistoryQuery = serde_json::from_str(
            r#"{"stationId": "s1", "from": "2024-01-01T00:00:00Z", "to": "2024-01-02T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(query.from, "2024-01-01T00:00:00Z");
        assert!(query.cursor.is_none());
    }

    #[test]
    fn test_create_request_validation_wiring() {
        let request: CreateAirQualityRequest = serde_json::from_value(serde_json::json!({
            "stationId": "",
            "pm25": {"value": 4.0}
        }))
        .unwrap();
        // Empty station is a validation error before any storage work
        assert!(request.check().is_err());
    }
}
