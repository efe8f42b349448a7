//! User repository.

use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};

use domain::models::User;

use crate::db::collections;
use crate::metrics::QueryTimer;

/// Repository for the `users` collection.
#[derive(Clone)]
pub struct UserRepository {
    collection: Collection<User>,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self {
            collection: db.collection(collections::USERS),
        }
    }

    pub async fn insert(&self, user: &User) -> Result<(), mongodb::error::Error> {
        let timer = QueryTimer::new("insert_user");
        let result = self.collection.insert_one(user, None).await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = self.collection.find_one(doc! {"_id": id}, None).await;
        timer.record();
        result
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_user_by_email");
        let result = self.collection.find_one(doc! {"email": email}, None).await;
        timer.record();
        result
    }

    pub async fn find_all(&self) -> Result<Vec<User>, mongodb::error::Error> {
        let timer = QueryTimer::new("find_all_users");
        let options = FindOptions::builder().sort(doc! {"email": 1}).build();
        let result = match self.collection.find(doc! {}, options).await {
            Ok(cursor) => cursor.try_collect().await,
            Err(e) => Err(e),
        };
        timer.record();
        result
    }

    /// Replace the whole document.
    pub async fn replace(&self, user: &User) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("replace_user");
        let result = self
            .collection
            .replace_one(doc! {"_id": &user.id}, user, None)
            .await;
        timer.record();
        result.map(|r| r.matched_count > 0)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, mongodb::error::Error> {
        let timer = QueryTimer::new("delete_user");
        let result = self.collection.delete_one(doc! {"_id": id}, None).await;
        timer.record();
        result.map(|r| r.deleted_count > 0)
    }
}
