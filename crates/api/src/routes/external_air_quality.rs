//! Externally ingested reading endpoint handlers.
//!
//! Read-only: documents in this collection arrive through the MQTT
//! subscriber and the HTTP poller, never through the API.

use axum::{
    extract::{Query, State},
    Json,
};

use domain::models::air_quality::LatestReadingQuery;
use domain::models::external_air_quality::ListExternalQuery;
use domain::models::ExternalAirQuality;
use persistence::repositories::ExternalAirQualityRepository;

use crate::app::AppState;
use crate::error::ApiError;

/// List recent external readings, newest first.
///
/// GET /api/external/airquality?stationId=&limit=
pub async fn list_readings(
    State(state): State<AppState>,
    Query(query): Query<ListExternalQuery>,
) -> Result<Json<Vec<ExternalAirQuality>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(state.config.limits.default_page_size)
        .clamp(1, state.config.limits.max_page_size);

    let repo = ExternalAirQualityRepository::new(state.db.clone());
    let readings = repo.find_recent(query.station_id.as_deref(), limit).await?;
    Ok(Json(readings))
}

/// Newest external reading for a station.
///
/// GET /api/external/airquality/latest?stationId=
pub async fn latest_reading(
    State(state): State<AppState>,
    Query(query): Query<LatestReadingQuery>,
) -> Result<Json<ExternalAirQuality>, ApiError> {
    let repo = ExternalAirQualityRepository::new(state.db.clone());
    let reading = repo
        .latest_for_station(&query.station_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No readings for station".to_string()))?;
    Ok(Json(reading))
}

#[cfg(test)]
mod tests {
    use domain::models::external_air_quality::ListExternalQuery;

    #[test]
    fn test_list_query_defaults() {
        let query: ListExternalQuery = serde_json::from_str("{}").unwrap();
        assert!(query.station_id.is_none());
        assert!(query.limit.is_none());
    }
}
