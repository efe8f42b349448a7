//! Externally sourced reading repository.

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneOptions, FindOptions};
use mongodb::{Collection, Database};

use domain::models::ExternalAirQuality;
use shared::time;

use crate::db::collections;
use crate::metrics::QueryTimer;

/// Repository for the `external_air_quality` collection.
#[derive(Clone)]
pub struct ExternalAirQualityRepository {
    collection: Collection<ExternalAirQuality>,
}

impl ExternalAirQualityRepository {
    pub fn new(db: Database) -> Self {
        Self {
            collection: db.collection(collections::EXTERNAL_AIR_QUALITY),
        }
    }

    pub async fn insert(&self, reading: &ExternalAirQuality) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("insert_external_air_quality");
        let result = self.collection.insert_one(reading, None).await;
        timer.record();
        result.map(|_| ())
    }

    /// Store a polled batch in one round trip.
    pub async fn insert_many(
        &self,
        readings: &[ExternalAirQuality],
    ) -> Result<usize, mongodb::error::Error> {
        if readings.is_empty() {
            return Ok(0);
        }
        let timer = QueryTimer::new("insert_many_external_air_quality");
        let result = self.collection.insert_many(readings, None).await;
        timer.record();
        result.map(|r| r.inserted_ids.len())
    }

    /// Most recent external readings, optionally restricted to one station.
    pub async fn find_recent(
        &self,
        station_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ExternalAirQuality>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_recent_external_air_quality");
        let filter = match station_id {
            Some(id) => doc! {"stationId": id},
            None => doc! {},
        };
        let options = FindOptions::builder()
            .sort(doc! {"dateObserved.value": -1, "_id": -1})
            .limit(limit)
            .build();
        let result = match self.collection.find(filter, options).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Newest external reading for a station.
    pub async fn latest_for_station(
        &self,
        station_id: &str,
    ) -> Result<Option<ExternalAirQuality>, mongodb::error::Error> {
        let timer = QueryTimer::new("latest_external_air_quality");
        let options = FindOneOptions::builder()
            .sort(doc! {"dateObserved.value": -1, "_id": -1})
            .build();
        let result = self
            .collection
            .find_one(doc! {"stationId": station_id}, options)
            .await;
        timer.record();
        result
    }

    /// Delete readings observed before `cutoff`. Returns the deleted count.
    pub async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, mongodb::error::Error> {
        let timer = QueryTimer::new("delete_old_external_air_quality");
        let result = self
            .collection
            .delete_many(
                doc! {"dateObserved.value": {"$lt": time::to_canonical(cutoff)}},
                None,
            )
            .await;
        timer.record();
        result.map(|r| r.deleted_count)
    }
}
