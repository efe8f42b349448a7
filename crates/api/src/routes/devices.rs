//! Device endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use domain::models::device::{DeviceCommandRequest, RegisterDeviceRequest};
use domain::models::Device;
use persistence::repositories::DeviceRepository;

use crate::app::AppState;
use crate::error::ApiError;

/// Query parameters for device listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDevicesQuery {
    pub user_id: Option<String>,
}

/// List devices, optionally restricted to one owner.
///
/// GET /api/devices?userId=
pub async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<ListDevicesQuery>,
) -> Result<Json<Vec<Device>>, ApiError> {
    let repo = DeviceRepository::new(state.db.clone());
    Ok(Json(repo.find_all(query.user_id.as_deref()).await?))
}

/// Register a device.
///
/// POST /api/devices
pub async fn register_device(
    State(state): State<AppState>,
    Json(request): Json<RegisterDeviceRequest>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    request.validate()?;

    let device = request.into_document();
    let repo = DeviceRepository::new(state.db.clone());
    repo.insert(&device).await?;

    info!(device_id = %device.id, name = %device.name, "Device registered");
    Ok((StatusCode::CREATED, Json(device)))
}

/// Get a single device.
///
/// GET /api/devices/:device_id
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, ApiError> {
    let repo = DeviceRepository::new(state.db.clone());
    let device = repo
        .find_by_id(&device_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Device not found".to_string()))?;
    Ok(Json(device))
}

/// Issue an on/off command.
///
/// POST /api/devices/:device_id/command
pub async fn command_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(request): Json<DeviceCommandRequest>,
) -> Result<Json<Device>, ApiError> {
    let repo = DeviceRepository::new(state.db.clone());

    if !repo
        .set_state(&device_id, request.command, shared::time::now())
        .await?
    {
        return Err(ApiError::NotFound("Device not found".to_string()));
    }

    let device = repo
        .find_by_id(&device_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Device not found".to_string()))?;

    info!(
        device_id = %device_id,
        command = request.command.as_str(),
        "Device command applied"
    );
    Ok(Json(device))
}

/// Delete a device.
///
/// DELETE /api/devices/:device_id
pub async fn delete_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let repo = DeviceRepository::new(state.db.clone());
    if !repo.delete(&device_id).await? {
        return Err(ApiError::NotFound("Device not found".to_string()));
    }

    info!(device_id = %device_id, "Device deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_owner_optional() {
        let query: ListDevicesQuery = serde_json::from_str("{}").unwrap();
        assert!(query.user_id.is_none());
    }

    #[test]
    fn test_command_request_verbs() {
        let request: DeviceCommandRequest =
            serde_json::from_value(serde_json::json!({"command": "on"})).unwrap();
        assert_eq!(request.command.as_str(), "on");
    }
}
