//! Station repository.

use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};

use domain::models::Station;

use crate::db::collections;
use crate::metrics::QueryTimer;

/// Repository for the `stations` collection.
#[derive(Clone)]
pub struct StationRepository {
    collection: Collection<Station>,
}

impl StationRepository {
    pub fn new(db: Database) -> Self {
        Self {
            collection: db.collection(collections::STATIONS),
        }
    }

    pub async fn insert(&self, station: &Station) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("insert_station");
        let result = self.collection.insert_one(station, None).await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Station>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_station_by_id");
        let result = self.collection.find_one(doc! {"_id": id}, None).await;
        timer.record();
        result
    }

    /// Whether a station with this slug exists.
    pub async fn exists(&self, id: &str) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("station_exists");
        let result = self
            .collection
            .count_documents(doc! {"_id": id}, None)
            .await;
        timer.record();
        result.map(|count| count > 0)
    }

    /// All stations, name order.
    pub async fn find_all(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<Station>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_all_stations");
        let filter = if include_inactive {
            doc! {}
        } else {
            doc! {"active": true}
        };
        let options = FindOptions::builder().sort(doc! {"name": 1}).build();
        let result = match self.collection.find(filter, options).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Replace the whole document.
    pub async fn replace(&self, station: &Station) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("replace_station");
        let result = self
            .collection
            .replace_one(doc! {"_id": &station.id}, station, None)
            .await;
        timer.record();
        result.map(|r| r.matched_count > 0)
    }

    /// Delete a station. Returns whether a document was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("delete_station");
        let result = self.collection.delete_one(doc! {"_id": id}, None).await;
        timer.record();
        result.map(|r| r.deleted_count > 0)
    }
}
