//! Air-quality reading repository.

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOneOptions, FindOptions};
use mongodb::{Collection, Database};

use domain::models::AirQuality;
use shared::time;

use crate::db::collections;
use crate::metrics::QueryTimer;

/// Newest-first sort shared by every reading query. The `_id` tiebreaker
/// keeps cursor pagination stable for identical timestamps.
fn newest_first() -> Document {
    doc! {"dateObserved.value": -1, "_id": -1}
}

/// Repository for the `air_quality` collection.
#[derive(Clone)]
pub struct AirQualityRepository {
    collection: Collection<AirQuality>,
}

impl AirQualityRepository {
    /// Creates a new repository over the given database handle.
    pub fn new(db: Database) -> Self {
        Self {
            collection: db.collection(collections::AIR_QUALITY),
        }
    }

    /// Store a reading.
    pub async fn insert(&self, reading: &AirQuality) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("insert_air_quality");
        let result = self.collection.insert_one(reading, None).await;
        timer.record();
        result.map(|_| ())
    }

    /// Most recent readings, optionally restricted to one station.
    pub async fn find_recent(
        &self,
        station_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<AirQuality>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_recent_air_quality");
        let filter = match station_id {
            Some(id) => doc! {"stationId": id},
            None => doc! {},
        };
        let options = FindOptions::builder()
            .sort(newest_first())
            .limit(limit)
            .build();
        let result = match self.collection.find(filter, options).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Newest reading for a station.
    pub async fn latest_for_station(
        &self,
        station_id: &str,
    ) -> Result<Option<AirQuality>, mongodb::error::Error> {
        let timer = QueryTimer::new("latest_air_quality");
        let options = FindOneOptions::builder().sort(newest_first()).build();
        let result = self
            .collection
            .find_one(doc! {"stationId": station_id}, options)
            .await;
        timer.record();
        result
    }

    /// One page of history within `[from, to)`, newest first.
    ///
    /// `after` is the composite cursor of the previous page's last row;
    /// results strictly precede it in the sort order.
    pub async fn history(
        &self,
        station_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        after: Option<(DateTime<Utc>, String)>,
        limit: i64,
    ) -> Result<Vec<AirQuality>, mongodb::error::Error> {
        let timer = QueryTimer::new("history_air_quality");

        let mut filter = doc! {
            "dateObserved.value": {
                "$gte": time::to_canonical(from),
                "$lt": time::to_canonical(to),
            }
        };
        if let Some(id) = station_id {
            filter.insert("stationId", id);
        }
        if let Some((ts, id)) = after {
            let ts = time::to_canonical(ts);
            filter = doc! {
                "$and": [
                    filter,
                    {"$or": [
                        {"dateObserved.value": {"$lt": &ts}},
                        {"dateObserved.value": &ts, "_id": {"$lt": id}},
                    ]},
                ]
            };
        }

        let options = FindOptions::builder()
            .sort(newest_first())
            .limit(limit)
            .build();
        let result = match self.collection.find(filter, options).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Delete readings observed before `cutoff`. Returns the deleted count.
    pub async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, mongodb::error::Error> {
        let timer = QueryTimer::new("delete_old_air_quality");
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_newest_first_sort_shape() {
        let sort = newest_first();
        assert_eq!(sort.get_i32("dateObserved.value").unwrap(), -1);
        assert_eq!(sort.get_i32("_id").unwrap(), -1);
    }

    #[test]
    fn test_history_range_uses_canonical_strings() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let filter = doc! {
            "dateObserved.value": {"$gte": time::to_canonical(from)}
        };
        let range = filter.get_document("dateObserved.value").unwrap();
        assert_eq!(range.get_str("$gte").unwrap(), "2024-01-01T00:00:00.000Z");
    }
}
