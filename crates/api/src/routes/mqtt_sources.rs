//! External MQTT source endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};
use validator::Validate;

use domain::models::external_mqtt_source::{
    CreateMqttSourceRequest, MqttTestResponse, UpdateMqttSourceRequest,
};
use domain::models::station::StationKind;
use domain::models::{ExternalMqttSource, Station};
use persistence::repositories::{ExternalMqttSourceRepository, StationRepository};
use shared::slug;

use crate::app::AppState;
use crate::error::ApiError;

async fn find_source(
    repo: &ExternalMqttSourceRepository,
    source_id: &str,
) -> Result<ExternalMqttSource, ApiError> {
    repo.find_by_id(source_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("MQTT source not found".to_string()))
}

/// List registered MQTT sources.
///
/// GET /api/mqtt/sources
pub async fn list_sources(
    State(state): State<AppState>,
) -> Result<Json<Vec<ExternalMqttSource>>, ApiError> {
    let repo = ExternalMqttSourceRepository::new(state.db.clone());
    Ok(Json(repo.find_all().await?))
}

/// Register an MQTT source. Ingestion starts on explicit activation.
///
/// POST /api/mqtt/sources
pub async fn create_source(
    State(state): State<AppState>,
    Json(request): Json<CreateMqttSourceRequest>,
) -> Result<(StatusCode, Json<ExternalMqttSource>), ApiError> {
    request.validate()?;

    let station_name = request
        .station_name
        .clone()
        .unwrap_or_else(|| request.name.clone());
    let station_id = slug::slugify(&station_name);
    let latitude = request.latitude;
    let longitude = request.longitude;

    let source = request.into_document(station_id.clone());
    let repo = ExternalMqttSourceRepository::new(state.db.clone());
    repo.insert(&source).await?;

    info!(
        source_id = %source.id,
        host = %source.host,
        topic = %source.topic,
        "MQTT source registered"
    );

    // Same best-effort station bootstrap as for HTTP sources
    let stations = StationRepository::new(state.db.clone());
    match stations.exists(&station_id).await {
        Ok(true) => {}
        Ok(false) => {
            let now = shared::time::now();
            let station = Station {
                id: station_id.clone(),
                name: station_name,
                latitude: latitude.unwrap_or(0.0),
                longitude: longitude.unwrap_or(0.0),
                kind: StationKind::ExternalMqtt,
                active: true,
                openaq_id: None,
                created_at: now,
                updated_at: now,
            };
            if let Err(e) = stations.insert(&station).await {
                warn!(station_id = %station_id, error = %e, "Could not auto-create station");
            }
        }
        Err(e) => warn!(station_id = %station_id, error = %e, "Station lookup failed"),
    }

    Ok((StatusCode::CREATED, Json(source)))
}

/// Get a single MQTT source.
///
/// GET /api/mqtt/sources/:source_id
pub async fn get_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> Result<Json<ExternalMqttSource>, ApiError> {
    let repo = ExternalMqttSourceRepository::new(state.db.clone());
    Ok(Json(find_source(&repo, &source_id).await?))
}

/// Replace an MQTT source. A running subscriber keeps its old connection;
/// changes apply on the next activate.
///
/// PUT /api/mqtt/sources/:source_id
pub async fn update_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
    Json(request): Json<UpdateMqttSourceRequest>,
) -> Result<Json<ExternalMqttSource>, ApiError> {
    request.validate()?;

    let repo = ExternalMqttSourceRepository::new(state.db.clone());
    let existing = find_source(&repo, &source_id).await?;

    let source = request.into_document(&existing);
    repo.replace(&source).await?;

    info!(source_id = %source.id, "MQTT source updated");
    Ok(Json(source))
}

/// Delete an MQTT source, stopping its subscriber if running.
///
/// DELETE /api/mqtt/sources/:source_id
pub async fn delete_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.mqtt.deactivate(&source_id).await;

    let repo = ExternalMqttSourceRepository::new(state.db.clone());
    if !repo.delete(&source_id).await? {
        return Err(ApiError::NotFound("MQTT source not found".to_string()));
    }

    info!(source_id = %source_id, "MQTT source deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Start the subscriber task and persist the active flag.
///
/// POST /api/mqtt/sources/:source_id/activate
pub async fn activate_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> Result<Json<ExternalMqttSource>, ApiError> {
    let repo = ExternalMqttSourceRepository::new(state.db.clone());
    let source = find_source(&repo, &source_id).await?;

    repo.set_active(&source_id, true).await?;
    state.mqtt.activate(source).await;

    let updated = find_source(&repo, &source_id).await?;
    info!(source_id = %source_id, "MQTT source activated");
    Ok(Json(updated))
}

/// Stop the subscriber task and persist the inactive flag.
///
/// POST /api/mqtt/sources/:source_id/deactivate
pub async fn deactivate_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> Result<Json<ExternalMqttSource>, ApiError> {
    let repo = ExternalMqttSourceRepository::new(state.db.clone());
    let _ = find_source(&repo, &source_id).await?;

    state.mqtt.deactivate(&source_id).await;
    repo.set_active(&source_id, false).await?;

    let updated = find_source(&repo, &source_id).await?;
    info!(source_id = %source_id, "MQTT source deactivated");
    Ok(Json(updated))
}

/// Probe broker reachability without storing anything.
///
/// POST /api/mqtt/sources/:source_id/test
pub async fn test_source(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
) -> Result<Json<MqttTestResponse>, ApiError> {
    let repo = ExternalMqttSourceRepository::new(state.db.clone());
    let source = find_source(&repo, &source_id).await?;

    let result = state.mqtt.probe(&source).await;
    info!(
        source_id = %source_id,
        reachable = result.reachable,
        elapsed_ms = result.elapsed_ms,
        "MQTT source probed"
    );
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_requires_topic() {
        let result: Result<CreateMqttSourceRequest, _> =
            serde_json::from_value(serde_json::json!({
                "name": "x",
                "host": "broker.example.org"
            }));
        assert!(result.is_err());
    }

    #[test]
    fn test_update_request_validation() {
        let request: UpdateMqttSourceRequest = serde_json::from_value(serde_json::json!({
            "name": "",
            "host": "broker.example.org",
            "port": 1883,
            "topic": "t"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }
}
