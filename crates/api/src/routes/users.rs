//! User endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use validator::Validate;

use domain::models::user::{LoginRequest, RegisterUserRequest, UpdateUserRequest, UserResponse};
use domain::models::User;
use persistence::repositories::UserRepository;
use shared::password;

use crate::app::AppState;
use crate::error::ApiError;

/// Register a user.
///
/// POST /api/users
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    request.validate()?;

    let repo = UserRepository::new(state.db.clone());
    if repo.find_by_email(&request.email).await?.is_some() {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }

    let hash = password::hash_password(&request.password)
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;
    let user = User::new(request.email, request.display_name, hash);
    repo.insert(&user).await?;

    info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Verify credentials.
///
/// POST /api/users/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let repo = UserRepository::new(state.db.clone());

    // One error for every failure mode; responses must not reveal whether
    // the email exists
    let rejected = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = repo
        .find_by_email(&request.email)
        .await?
        .ok_or_else(rejected)?;

    if !user.active {
        return Err(rejected());
    }

    let matches = password::verify_password(&request.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(format!("Password verification failed: {}", e)))?;
    if !matches {
        return Err(rejected());
    }

    info!(user_id = %user.id, "User logged in");
    Ok(Json(user.into()))
}

/// List users.
///
/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let repo = UserRepository::new(state.db.clone());
    let users = repo.find_all().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Get a single user.
///
/// GET /api/users/:user_id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let repo = UserRepository::new(state.db.clone());
    let user = repo
        .find_by_id(&user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user.into()))
}

/// Update a user's profile, optionally rotating the password.
///
/// PUT /api/users/:user_id
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    request.validate()?;

    let repo = UserRepository::new(state.db.clone());
    let mut user = repo
        .find_by_id(&user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    user.display_name = request.display_name;
    user.active = request.active;
    if let Some(new_password) = request.password {
        user.password_hash = password::hash_password(&new_password)
            .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;
    }
    user.updated_at = shared::time::now();

    repo.replace(&user).await?;

    info!(user_id = %user.id, "User updated");
    Ok(Json(user.into()))
}

/// Delete a user.
///
/// DELETE /api/users/:user_id
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let repo = UserRepository::new(state.db.clone());
    if !repo.delete(&user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!(user_id = %user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let request: RegisterUserRequest = serde_json::from_value(serde_json::json!({
            "email": "nope",
            "displayName": "X",
            "password": "short"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_login_request_deserialization() {
        let request: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "maja@example.org",
            "password": "secret123"
        }))
        .unwrap();
        assert_eq!(request.email, "maja@example.org");
    }
}
