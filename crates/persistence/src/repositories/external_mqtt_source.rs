//! External MQTT source repository.

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};

use domain::models::ExternalMqttSource;
use shared::time;

use crate::db::collections;
use crate::metrics::QueryTimer;

/// Repository for the `external_mqtt_sources` collection.
#[derive(Clone)]
pub struct ExternalMqttSourceRepository {
    collection: Collection<ExternalMqttSource>,
}

impl ExternalMqttSourceRepository {
    pub fn new(db: Database) -> Self {
        Self {
            collection: db.collection(collections::EXTERNAL_MQTT_SOURCES),
        }
    }

    pub async fn insert(&self, source: &ExternalMqttSource) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("insert_mqtt_source");
        let result = self.collection.insert_one(source, None).await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn find_by_id(
        &self,
        id: &str,
    ) -> Result<Option<ExternalMqttSource>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_mqtt_source_by_id");
        let result = self.collection.find_one(doc! {"_id": id}, None).await;
        timer.record();
        result
    }

    pub async fn find_all(&self) -> Result<Vec<ExternalMqttSource>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_all_mqtt_sources");
        let options = FindOptions::builder().sort(doc! {"name": 1}).build();
        let result = match self.collection.find(doc! {}, options).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Sources whose subscriber task should be running.
    pub async fn find_active(&self) -> Result<Vec<ExternalMqttSource>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_active_mqtt_sources");
        let result = match self.collection.find(doc! {"active": true}, None).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Replace the whole document.
    pub async fn replace(
        &self,
        source: &ExternalMqttSource,
    ) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("replace_mqtt_source");
        let result = self
            .collection
            .replace_one(doc! {"_id": &source.id}, source, None)
            .await;
        timer.record();
        result.map(|r| r.matched_count > 0)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("delete_mqtt_source");
        let result = self.collection.delete_one(doc! {"_id": id}, None).await;
        timer.record();
        result.map(|r| r.deleted_count > 0)
    }

    /// Persist the active flag. Returns whether the source exists.
    pub async fn set_active(&self, id: &str, active: bool) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("set_mqtt_source_active");
        let result = self
            .collection
            .update_one(doc! {"_id": id}, doc! {"$set": {"active": active}}, None)
            .await;
        timer.record();
        result.map(|r| r.matched_count > 0)
    }

    /// Bump the display counter after a stored message and clear the
    /// failure streak.
    pub async fn record_message(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("record_mqtt_message");
        let result = self
            .collection
            .update_one(
                doc! {"_id": id},
                doc! {
                    "$inc": {"messageCount": 1},
                    "$set": {
                        "failureCount": 0,
                        "lastMessageAt": time::to_canonical(at),
                    },
                },
                None,
            )
            .await;
        timer.record();
        result.map(|_| ())
    }

    /// Increment the connection failure streak.
    pub async fn record_failure(&self, id: &str) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("record_mqtt_failure");
        let result = self
            .collection
            .update_one(doc! {"_id": id}, doc! {"$inc": {"failureCount": 1}}, None)
            .await;
        timer.record();
        result.map(|_| ())
    }
}
