//! External HTTP source repository.

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Collection, Database};

use domain::models::ExternalSource;
use shared::time;

use crate::db::collections;
use crate::metrics::QueryTimer;

/// Repository for the `external_sources` collection.
#[derive(Clone)]
pub struct ExternalSourceRepository {
    collection: Collection<ExternalSource>,
}

impl ExternalSourceRepository {
    pub fn new(db: Database) -> Self {
        Self {
            collection: db.collection(collections::EXTERNAL_SOURCES),
        }
    }

    pub async fn insert(&self, source: &ExternalSource) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("insert_external_source");
        let result = self.collection.insert_one(source, None).await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn find_by_id(
        &self,
        id: &str,
    ) -> Result<Option<ExternalSource>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_external_source_by_id");
        let result = self.collection.find_one(doc! {"_id": id}, None).await;
        timer.record();
        result
    }

    pub async fn find_all(&self) -> Result<Vec<ExternalSource>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_all_external_sources");
        let options = FindOptions::builder().sort(doc! {"name": 1}).build();
        let result = match self.collection.find(doc! {}, options).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Sources eligible for polling. Interval arithmetic happens in the
    /// poll job; this returns everything currently active.
    pub async fn find_active(&self) -> Result<Vec<ExternalSource>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_active_external_sources");
        let result = match self.collection.find(doc! {"active": true}, None).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Replace the whole document.
    pub async fn replace(&self, source: &ExternalSource) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("replace_external_source");
        let result = self
            .collection
            .replace_one(doc! {"_id": &source.id}, source, None)
            .await;
        timer.record();
        result.map(|r| r.matched_count > 0)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("delete_external_source");
        let result = self.collection.delete_one(doc! {"_id": id}, None).await;
        timer.record();
        result.map(|r| r.deleted_count > 0)
    }

    /// Stamp the poll attempt time.
    pub async fn mark_polled(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("mark_external_source_polled");
        let result = self
            .collection
            .update_one(
                doc! {"_id": id},
                doc! {"$set": {"lastPolledAt": time::to_canonical(at)}},
                None,
            )
            .await;
        timer.record();
        result.map(|_| ())
    }

    /// Record a successful poll: clear the failure streak.
    pub async fn record_success(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("record_external_source_success");
        let result = self
            .collection
            .update_one(
                doc! {"_id": id},
                doc! {"$set": {
                    "failureCount": 0,
                    "lastSuccessAt": time::to_canonical(at),
                }},
                None,
            )
            .await;
        timer.record();
        result.map(|_| ())
    }

    /// Increment the failure streak and return the updated document so the
    /// caller can compare against the deactivation threshold.
    pub async fn record_failure(
        &self,
        id: &str,
    ) -> Result<Option<ExternalSource>, mongodb::error::Error> {
        let timer = QueryTimer::new("record_external_source_failure");
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let result = self
            .collection
            .find_one_and_update(
                doc! {"_id": id},
                doc! {"$inc": {"failureCount": 1}},
                options,
            )
            .await;
        timer.record();
        result
    }

    /// Flip the source inactive (auto-deactivation).
    pub async fn deactivate(&self, id: &str) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("deactivate_external_source");
        let result = self
            .collection
            .update_one(doc! {"_id": id}, doc! {"$set": {"active": false}}, None)
            .await;
        timer.record();
        result.map(|_| ())
    }

    /// Reactivate a source and clear its failure streak. Returns whether the
    /// source exists.
    pub async fn reactivate(&self, id: &str) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("reactivate_external_source");
        let result = self
            .collection
            .update_one(
                doc! {"_id": id},
                doc! {"$set": {"active": true, "failureCount": 0}},
                None,
            )
            .await;
        timer.record();
        result.map(|r| r.matched_count > 0)
    }
}
