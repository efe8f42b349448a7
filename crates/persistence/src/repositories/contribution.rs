//! Contribution repositories.

use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneOptions, FindOptions};
use mongodb::{Collection, Database};

use domain::models::{ContributedAirQuality, Contribution};
use shared::time;

use crate::db::collections;
use crate::metrics::QueryTimer;

/// Repository for contribution metadata (`contributions`).
#[derive(Clone)]
pub struct ContributionRepository {
    collection: Collection<Contribution>,
}

impl ContributionRepository {
    pub fn new(db: Database) -> Self {
        Self {
            collection: db.collection(collections::CONTRIBUTIONS),
        }
    }

    pub async fn insert(&self, contribution: &Contribution) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("insert_contribution");
        let result = self.collection.insert_one(contribution, None).await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn find_by_id(
        &self,
        id: &str,
    ) -> Result<Option<Contribution>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_contribution_by_id");
        let result = self.collection.find_one(doc! {"_id": id}, None).await;
        timer.record();
        result
    }

    /// A user's contributions, newest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Contribution>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_contributions_by_user");
        let options = FindOptions::builder().sort(doc! {"createdAt": -1}).build();
        let result = match self.collection.find(doc! {"userId": user_id}, options).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// The public catalogue, newest first.
    pub async fn find_public(&self) -> Result<Vec<Contribution>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_public_contributions");
        let options = FindOptions::builder().sort(doc! {"createdAt": -1}).build();
        let result = match self.collection.find(doc! {"public": true}, options).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Add uploaded readings to the running count.
    pub async fn add_readings(
        &self,
        id: &str,
        count: u64,
    ) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("add_contribution_readings");
        let result = self
            .collection
            .update_one(
                doc! {"_id": id},
                doc! {
                    "$inc": {"readingCount": count as i64},
                    "$set": {"updatedAt": time::to_canonical(time::now())},
                },
                None,
            )
            .await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn delete(&self, id: &str) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("delete_contribution");
        let result = self.collection.delete_one(doc! {"_id": id}, None).await;
        timer.record();
        result.map(|r| r.deleted_count > 0)
    }
}

/// Repository for contributed readings (`contributed_air_quality`).
#[derive(Clone)]
pub struct ContributedDataRepository {
    collection: Collection<ContributedAirQuality>,
}

impl ContributedDataRepository {
    pub fn new(db: Database) -> Self {
        Self {
            collection: db.collection(collections::CONTRIBUTED_AIR_QUALITY),
        }
    }

    pub async fn insert_many(
        &self,
        readings: &[ContributedAirQuality],
    ) -> Result<usize, mongodb::error::Error> {
        if readings.is_empty() {
            return Ok(0);
        }
        let timer = QueryTimer::new("insert_many_contributed");
        let result = self.collection.insert_many(readings, None).await;
        timer.record();
        result.map(|r| r.inserted_ids.len())
    }

    /// All readings under a contribution, newest first.
    pub async fn find_by_contribution(
        &self,
        contribution_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ContributedAirQuality>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_contributed_by_contribution");
        let builder = FindOptions::builder().sort(doc! {"dateObserved.value": -1, "_id": -1});
        let options = match limit {
            Some(limit) => builder.limit(limit).build(),
            None => builder.build(),
        };
        let result = match self
            .collection
            .find(doc! {"contributionId": contribution_id}, options)
            .await
        {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Newest reading under a contribution.
    pub async fn latest_for_contribution(
        &self,
        contribution_id: &str,
    ) -> Result<Option<ContributedAirQuality>, mongodb::error::Error> {
        let timer = QueryTimer::new("latest_contributed");
        let options = FindOneOptions::builder()
            .sort(doc! {"dateObserved.value": -1, "_id": -1})
            .build();
        let result = self
            .collection
            .find_one(doc! {"contributionId": contribution_id}, options)
            .await;
        timer.record();
        result
    }

    /// Remove all readings under a contribution. Returns the deleted count.
    pub async fn delete_by_contribution(
        &self,
        contribution_id: &str,
    ) -> Result<u64, mongodb::error::Error> {
        let timer = QueryTimer::new("delete_contributed_by_contribution");
        let result = self
            .collection
            .delete_many(doc! {"contributionId": contribution_id}, None)
            .await;
        timer.record();
        result.map(|r| r.deleted_count)
    }
}
