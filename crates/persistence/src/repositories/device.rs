//! Device repository.

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};

use domain::models::device::PowerState;
use domain::models::Device;
use shared::time;

use crate::db::collections;
use crate::metrics::QueryTimer;

/// Repository for the `devices` collection.
#[derive(Clone)]
pub struct DeviceRepository {
    collection: Collection<Device>,
}

impl DeviceRepository {
    pub fn new(db: Database) -> Self {
        Self {
            collection: db.collection(collections::DEVICES),
        }
    }

    pub async fn insert(&self, device: &Device) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("insert_device");
        let result = self.collection.insert_one(device, None).await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Device>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_device_by_id");
        let result = self.collection.find_one(doc! {"_id": id}, None).await;
        timer.record();
        result
    }

    /// All devices, optionally restricted to one owner.
    pub async fn find_all(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<Device>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_all_devices");
        let filter = match user_id {
            Some(id) => doc! {"userId": id},
            None => doc! {},
        };
        let options = FindOptions::builder().sort(doc! {"name": 1}).build();
        let result = match self.collection.find(filter, options).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Apply an on/off command. Returns whether the device exists.
    pub async fn set_state(
        &self,
        id: &str,
        state: PowerState,
        at: DateTime<Utc>,
    ) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("set_device_state");
        let result = self
            .collection
            .update_one(
                doc! {"_id": id},
                doc! {"$set": {
                    "state": state.as_str(),
                    "lastCommandAt": time::to_canonical(at),
                    "updatedAt": time::to_canonical(at),
                }},
                None,
            )
            .await;
        timer.record();
        result.map(|r| r.matched_count > 0)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("delete_device");
        let result = self.collection.delete_one(doc! {"_id": id}, None).await;
        timer.record();
        result.map(|r| r.deleted_count > 0)
    }
}
