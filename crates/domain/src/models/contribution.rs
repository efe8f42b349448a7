//! Community-contributed data sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::air_quality::AirQuality;

/// A named batch of user-contributed readings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "userId")]
    pub user_id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Public contributions appear in the shared catalogue.
    pub public: bool,

    /// Readings uploaded so far.
    #[serde(rename = "readingCount", default)]
    pub reading_count: u64,

    #[serde(rename = "createdAt", with = "shared::time::canonical")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt", with = "shared::time::canonical")]
    pub updated_at: DateTime<Utc>,
}

/// A reading uploaded under a contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributedAirQuality {
    #[serde(flatten)]
    pub reading: AirQuality,

    #[serde(rename = "userId")]
    pub user_id: String,

    #[serde(rename = "contributionId")]
    pub contribution_id: String,
}

/// Request payload for creating a contribution.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateContributionRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub public: bool,

    #[validate(length(min = 1, message = "userId must not be empty"))]
    pub user_id: String,
}

impl CreateContributionRequest {
    pub fn into_document(self) -> Contribution {
        let now = shared::time::now();
        Contribution {
            id: Uuid::new_v4().to_string(),
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            public: self.public,
            reading_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Query parameters for listing a user's contributions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListContributionsQuery {
    pub user_id: String,
}
