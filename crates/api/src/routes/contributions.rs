//! Contribution endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use tracing::info;
use validator::Validate;

use domain::models::air_quality::CreateAirQualityRequest;
use domain::models::contribution::{CreateContributionRequest, ListContributionsQuery};
use domain::models::{ContributedAirQuality, Contribution};
use persistence::repositories::{ContributedDataRepository, ContributionRepository};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_reading_stored;
use crate::services::export;
use crate::services::hub::NEW_CONTRIBUTED_AIR_QUALITY;

async fn find_contribution(
    repo: &ContributionRepository,
    id: &str,
) -> Result<Contribution, ApiError> {
    repo.find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contribution not found".to_string()))
}

/// Create a contribution.
///
/// POST /api/contributions
pub async fn create_contribution(
    State(state): State<AppState>,
    Json(request): Json<CreateContributionRequest>,
) -> Result<(StatusCode, Json<Contribution>), ApiError> {
    request.validate()?;

    let contribution = request.into_document();
    let repo = ContributionRepository::new(state.db.clone());
    repo.insert(&contribution).await?;

    info!(
        contribution_id = %contribution.id,
        user_id = %contribution.user_id,
        "Contribution created"
    );
    Ok((StatusCode::CREATED, Json(contribution)))
}

/// A user's contributions.
///
/// GET /api/contributions/list?userId=
pub async fn list_contributions(
    State(state): State<AppState>,
    Query(query): Query<ListContributionsQuery>,
) -> Result<Json<Vec<Contribution>>, ApiError> {
    let repo = ContributionRepository::new(state.db.clone());
    Ok(Json(repo.find_by_user(&query.user_id).await?))
}

/// The public catalogue.
///
/// GET /api/contributions/public
pub async fn public_contributions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Contribution>>, ApiError> {
    let repo = ContributionRepository::new(state.db.clone());
    Ok(Json(repo.find_public().await?))
}

/// Get contribution metadata.
///
/// GET /api/contributions/:contribution_id
pub async fn get_contribution(
    State(state): State<AppState>,
    Path(contribution_id): Path<String>,
) -> Result<Json<Contribution>, ApiError> {
    let repo = ContributionRepository::new(state.db.clone());
    Ok(Json(find_contribution(&repo, &contribution_id).await?))
}

/// Delete a contribution and all readings under it.
///
/// DELETE /api/contributions/:contribution_id
pub async fn delete_contribution(
    State(state): State<AppState>,
    Path(contribution_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let repo = ContributionRepository::new(state.db.clone());
    if !repo.delete(&contribution_id).await? {
        return Err(ApiError::NotFound("Contribution not found".to_string()));
    }

    let data = ContributedDataRepository::new(state.db.clone());
    let removed = data.delete_by_contribution(&contribution_id).await?;

    info!(
        contribution_id = %contribution_id,
        readings_removed = removed,
        "Contribution deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Upload a batch of readings under a contribution.
///
/// POST /api/contributions/:contribution_id/upload
pub async fn upload_readings(
    State(state): State<AppState>,
    Path(contribution_id): Path<String>,
    Json(batch): Json<Vec<CreateAirQualityRequest>>,
) -> Result<(StatusCode, Json<Contribution>), ApiError> {
    if batch.is_empty() {
        return Err(ApiError::Validation("Upload batch is empty".to_string()));
    }
    let max_batch = state.config.limits.max_upload_batch;
    if batch.len() > max_batch {
        return Err(ApiError::Validation(format!(
            "Upload batch exceeds the maximum of {} readings",
            max_batch
        )));
    }
    for (index, request) in batch.iter().enumerate() {
        request
            .check()
            .map_err(|e| ApiError::Validation(format!("Reading {}: {}", index, e)))?;
    }

    let contributions = ContributionRepository::new(state.db.clone());
    let contribution = find_contribution(&contributions, &contribution_id).await?;

    let readings: Vec<ContributedAirQuality> = batch
        .into_iter()
        .map(|request| ContributedAirQuality {
            reading: request.into_document(),
            user_id: contribution.user_id.clone(),
            contribution_id: contribution.id.clone(),
        })
        .collect();

    let data = ContributedDataRepository::new(state.db.clone());
    let stored = data.insert_many(&readings).await?;
    contributions
        .add_readings(&contribution_id, stored as u64)
        .await?;

    for reading in &readings {
        record_reading_stored("contribution");
        state.hub.publish(NEW_CONTRIBUTED_AIR_QUALITY, reading);
    }

    let updated = find_contribution(&contributions, &contribution_id).await?;
    info!(
        contribution_id = %contribution_id,
        stored = stored,
        "Contribution readings uploaded"
    );
    Ok((StatusCode::CREATED, Json(updated)))
}

/// Newest reading under a contribution.
///
/// GET /api/contributions/:contribution_id/latest
pub async fn latest_reading(
    State(state): State<AppState>,
    Path(contribution_id): Path<String>,
) -> Result<Json<ContributedAirQuality>, ApiError> {
    let data = ContributedDataRepository::new(state.db.clone());
    let reading = data
        .latest_for_contribution(&contribution_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No readings for contribution".to_string()))?;
    Ok(Json(reading))
}

/// All readings under a contribution as a CSV attachment.
///
/// GET /api/contributions/:contribution_id/download
pub async fn download_readings(
    State(state): State<AppState>,
    Path(contribution_id): Path<String>,
) -> Result<Response, ApiError> {
    let contributions = ContributionRepository::new(state.db.clone());
    let _ = find_contribution(&contributions, &contribution_id).await?;

    let data = ContributedDataRepository::new(state.db.clone());
    let readings = data
        .find_by_contribution(&contribution_id, Some(state.config.limits.max_export_rows))
        .await?;

    let bytes = export::contributed_to_csv(&readings)
        .map_err(|e| ApiError::Internal(format!("CSV export failed: {}", e)))?;

    info!(
        contribution_id = %contribution_id,
        rows = readings.len(),
        "Contribution exported"
    );
    Ok(export::csv_attachment(
        &format!("contribution-{}.csv", contribution_id),
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let request: CreateContributionRequest = serde_json::from_value(serde_json::json!({
            "name": "",
            "userId": "u-1"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_list_query_requires_user() {
        let result: Result<ListContributionsQuery, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn test_upload_batch_deserialization() {
        let batch: Vec<CreateAirQualityRequest> = serde_json::from_value(serde_json::json!([
            {"stationId": "diy-1", "pm25": {"value": 9.0}},
            {"stationId": "diy-1", "pm25": {"value": 11.0}}
        ]))
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|r| r.check().is_ok()));
    }
}
