//! External HTTP source endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};
use validator::Validate;

use domain::models::external_source::{CreateExternalSourceRequest, UpdateExternalSourceRequest};
use domain::models::station::StationKind;
use domain::models::{ExternalSource, Station};
use persistence::repositories::{ExternalSourceRepository, StationRepository};
use shared::slug;

use crate::app::AppState;
use crate::error::ApiError;

/// Create the backing station for a source if it does not exist yet.
///
/// Deliberately non-blocking: the source is already stored, and a station
/// failure only costs the map its marker.
async fn auto_create_station(
    stations: &StationRepository,
    station_id: &str,
    name: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
    kind: StationKind,
) {
    match stations.exists(station_id).await {
        Ok(true) => {}
        Ok(false) => {
            let now = shared::time::now();
            let station = Station {
                id: station_id.to_string(),
                name: name.to_string(),
                latitude: latitude.unwrap_or(0.0),
                longitude: longitude.unwrap_or(0.0),
                kind,
                active: true,
                openaq_id: None,
                created_at: now,
                updated_at: now,
            };
            match stations.insert(&station).await {
                Ok(()) => info!(station_id = station_id, "Auto-created station"),
                Err(e) => warn!(
                    station_id = station_id,
                    error = %e,
                    "Could not auto-create station"
                ),
            }
        }
        Err(e) => warn!(station_id = station_id, error = %e, "Station lookup failed"),
    }
}

/// List registered sources.
///
/// GET /api/sources
pub async fn list_sources(
    State(state): State<AppState>,
) -> Result<Json<Vec<ExternalSource>>, ApiError> {
    let repo = ExternalSourceRepository::new(state.db.clone());
    Ok(Json(repo.find_all().await?))
}

/// Register a source. Its backing station is auto-created on a best-effort
/// basis.
///
/// POST /api/sources
pub async fn create_source(
    State(state): State<AppState>,
    Json(request): Json<CreateExternalSourceRequest>,
) -> Result<(StatusCode, Json<ExternalSource>), ApiError> {
    request.validate()?;

    let station_name = request
        .station_name
        .clone()
        .unwrap_or_else(|| request.name.clone());
    let station_id = slug::slugify(&station_name);
    let latitude = request.latitude;
    let longitude = request.longitude;

    let source = request.into_document(station_id.clone());
    let repo = ExternalSourceRepository::new(state.db.clone());
    repo.insert(&source).await?;

    info!(source_id = %source.id, url = %source.url, "External source registered");

    let stations = StationRepository::new(state.db.clone());
    auto_create_station(
        &stations,
        &station_id,
        &station_name,
        latitude,
        longitude,
        StationKind::ExternalHttp,
    )
    .await;

    Ok((StatusCode::CREATED, Json(source)))
}

/// Get a single source.
///
/// GET /api/sources/:source_id
pub async fn get_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> Result<Json<ExternalSource>, ApiError> {
    let repo = ExternalSourceRepository::new(state.db.clone());
    let source = repo
        .find_by_id(&source_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Source not found".to_string()))?;
    Ok(Json(source))
}

/// Replace a source.
///
/// PUT /api/sources/:source_id
pub async fn update_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
    Json(request): Json<UpdateExternalSourceRequest>,
) -> Result<Json<ExternalSource>, ApiError> {
    request.validate()?;

    let repo = ExternalSourceRepository::new(state.db.clone());
    let existing = repo
        .find_by_id(&source_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Source not found".to_string()))?;

    let source = request.into_document(&existing);
    repo.replace(&source).await?;

    info!(source_id = %source.id, "External source updated");
    Ok(Json(source))
}

/// Delete a source.
///
/// DELETE /api/sources/:source_id
pub async fn delete_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let repo = ExternalSourceRepository::new(state.db.clone());
    if !repo.delete(&source_id).await? {
        return Err(ApiError::NotFound("Source not found".to_string()));
    }

    info!(source_id = %source_id, "External source deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Undo auto-deactivation: set the source active and clear its failures.
///
/// POST /api/sources/:source_id/reactivate
pub async fn reactivate_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> Result<Json<ExternalSource>, ApiError> {
    let repo = ExternalSourceRepository::new(state.db.clone());
    if !repo.reactivate(&source_id).await? {
        return Err(ApiError::NotFound("Source not found".to_string()));
    }

    let source = repo
        .find_by_id(&source_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Source not found".to_string()))?;

    info!(source_id = %source_id, "External source reactivated");
    Ok(Json(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_slug_from_source_name() {
        // The station slug mirrors the (station or source) name
        assert_eq!(slug::slugify("ARSO Air Feed"), "arso-air-feed");
    }

    #[test]
    fn test_create_request_station_defaults() {
        let request: CreateExternalSourceRequest = serde_json::from_value(serde_json::json!({
            "name": "Feed",
            "url": "https://example.org/feed"
        }))
        .unwrap();
        assert!(request.station_name.is_none());
        assert!(request.latitude.is_none());
    }
}
