//! Station endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use validator::Validate;

use domain::models::station::{
    CreateStationRequest, ListStationsQuery, MapStation, UpdateStationRequest,
};
use domain::models::Station;
use persistence::repositories::StationRepository;
use shared::slug;

use crate::app::AppState;
use crate::error::ApiError;

/// Derives a unique station slug from a display name.
pub(crate) async fn mint_station_id(
    repo: &StationRepository,
    name: &str,
) -> Result<String, ApiError> {
    let base = slug::slugify(name);
    if !repo.exists(&base).await? {
        return Ok(base);
    }
    // A random suffix resolves the collision; a second clash is not worth
    // coding for at this collection size
    Ok(slug::with_suffix(&base))
}

/// List stations.
///
/// GET /api/stations?includeInactive=
pub async fn list_stations(
    State(state): State<AppState>,
    Query(query): Query<ListStationsQuery>,
) -> Result<Json<Vec<Station>>, ApiError> {
    let repo = StationRepository::new(state.db.clone());
    let stations = repo.find_all(query.include_inactive).await?;
    Ok(Json(stations))
}

/// Create a station.
///
/// POST /api/stations
pub async fn create_station(
    State(state): State<AppState>,
    Json(request): Json<CreateStationRequest>,
) -> Result<(StatusCode, Json<Station>), ApiError> {
    request.validate()?;

    let repo = StationRepository::new(state.db.clone());
    let id = mint_station_id(&repo, &request.name).await?;
    let station = request.into_document(id);
    repo.insert(&station).await?;

    info!(station_id = %station.id, name = %station.name, "Station created");
    Ok((StatusCode::CREATED, Json(station)))
}

/// Get a single station.
///
/// GET /api/stations/:station_id
pub async fn get_station(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
) -> Result<Json<Station>, ApiError> {
    let repo = StationRepository::new(state.db.clone());
    let station = repo
        .find_by_id(&station_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Station not found".to_string()))?;
    Ok(Json(station))
}

/// Replace a station.
///
/// PUT /api/stations/:station_id
pub async fn update_station(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
    Json(request): Json<UpdateStationRequest>,
) -> Result<Json<Station>, ApiError> {
    request.validate()?;

    let repo = StationRepository::new(state.db.clone());
    let existing = repo
        .find_by_id(&station_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Station not found".to_string()))?;

    let station = request.into_document(&existing);
    repo.replace(&station).await?;

    info!(station_id = %station.id, "Station updated");
    Ok(Json(station))
}

/// Delete a station.
///
/// DELETE /api/stations/:station_id
pub async fn delete_station(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let repo = StationRepository::new(state.db.clone());
    if !repo.delete(&station_id).await? {
        return Err(ApiError::NotFound("Station not found".to_string()));
    }

    info!(station_id = %station_id, "Station deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Active stations in the compact shape the map view renders.
///
/// GET /api/stations/map
pub async fn map_stations(
    State(state): State<AppState>,
) -> Result<Json<Vec<MapStation>>, ApiError> {
    let repo = StationRepository::new(state.db.clone());
    let stations = repo.find_all(false).await?;
    Ok(Json(stations.into_iter().map(MapStation::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_rejects_invalid_coordinates() {
        let request: CreateStationRequest = serde_json::from_value(serde_json::json!({
            "name": "Nowhere",
            "latitude": -91.0,
            "longitude": 200.0
        }))
        .unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("latitude"));
        assert!(errors.field_errors().contains_key("longitude"));
    }

    #[test]
    fn test_list_query_default_excludes_inactive() {
        let query: ListStationsQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.include_inactive);
    }
}
