//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A registered user. The stored document carries only the Argon2id hash;
/// API responses go through [`UserResponse`], which has no password field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,

    pub email: String,

    #[serde(rename = "displayName")]
    pub display_name: String,

    #[serde(rename = "passwordHash")]
    pub password_hash: String,

    pub active: bool,

    #[serde(rename = "createdAt", with = "shared::time::canonical")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt", with = "shared::time::canonical")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, display_name: String, password_hash: String) -> Self {
        let now = shared::time::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            display_name,
            password_hash,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request payload for registering a user.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
}

/// Request payload for logging in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request payload for updating a user.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: String,

    /// New password; omitted to keep the current one.
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: Option<String>,

    pub active: bool,
}

/// Client-facing user shape. Never carries password material.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub active: bool,
    #[serde(with = "shared::time::canonical")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            display_name: u.display_name,
            active: u.active,
            created_at: u.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{faker::internet::en::SafeEmail, Fake};

    #[test]
    fn test_register_request_validation() {
        let email: String = SafeEmail().fake();
        let request: RegisterUserRequest = serde_json::from_value(serde_json::json!({
            "email": email,
            "displayName": "Maja",
            "password": "longenough1"
        }))
        .unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_register_request_rejects_bad_email_and_short_password() {
        let request: RegisterUserRequest = serde_json::from_value(serde_json::json!({
            "email": "not-an-email",
            "displayName": "Maja",
            "password": "short"
        }))
        .unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_user_response_has_no_password_material() {
        let user = User::new(
            "maja@example.org".to_string(),
            "Maja".to_string(),
            "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        );
        let response: UserResponse = user.into();
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.to_lowercase().contains("password"));
        assert!(!json.contains("argon2id"));
    }

    #[test]
    fn test_stored_document_keeps_hash() {
        // The persistence serializer must keep the hash in the document
        let user = User::new(
            "maja@example.org".to_string(),
            "Maja".to_string(),
            "$argon2id$hash".to_string(),
        );
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["passwordHash"], "$argon2id$hash");
        assert_eq!(json["_id"], user.id);
    }

    #[test]
    fn test_update_request_optional_password() {
        let request: UpdateUserRequest = serde_json::from_value(serde_json::json!({
            "displayName": "Maja K",
            "active": true
        }))
        .unwrap();
        assert!(request.password.is_none());
        assert!(request.validate().is_ok());
    }
}
