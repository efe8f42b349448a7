//! MongoDB connection management.

use std::time::Duration;

use mongodb::bson::doc;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};
use tracing::info;

/// Collection names, in one place so repositories and the index bootstrap
/// cannot drift apart.
pub mod collections {
    pub const AIR_QUALITY: &str = "air_quality";
    pub const EXTERNAL_AIR_QUALITY: &str = "external_air_quality";
    pub const CONTRIBUTED_AIR_QUALITY: &str = "contributed_air_quality";
    pub const CONTRIBUTIONS: &str = "contributions";
    pub const STATIONS: &str = "stations";
    pub const EXTERNAL_SOURCES: &str = "external_sources";
    pub const EXTERNAL_MQTT_SOURCES: &str = "external_mqtt_sources";
    pub const USERS: &str = "users";
    pub const DEVICES: &str = "devices";
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub uri: String,
    pub database: String,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    pub connect_timeout_secs: u64,
    pub server_selection_timeout_secs: u64,
}

/// Creates a MongoDB database handle with the given configuration.
///
/// The driver connects lazily; reachability is checked by the readiness
/// probe via [`ping`], not here.
pub async fn connect(config: &DatabaseConfig) -> Result<Database, mongodb::error::Error> {
    let mut options = ClientOptions::parse(&config.uri).await?;
    options.app_name = Some("airwatch".to_string());
    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
    options.server_selection_timeout =
        Some(Duration::from_secs(config.server_selection_timeout_secs));

    let client = Client::with_options(options)?;
    Ok(client.database(&config.database))
}

/// Round-trips a `ping` command. Used by health checks.
pub async fn ping(db: &Database) -> Result<(), mongodb::error::Error> {
    db.run_command(doc! {"ping": 1}, None).await?;
    Ok(())
}

/// Creates the indexes the query paths rely on. Safe to run on every boot;
/// MongoDB treats identical index definitions as a no-op.
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Reading collections: station + observation time, newest first
    let reading_index = || {
        IndexModel::builder()
            .keys(doc! {"stationId": 1, "dateObserved.value": -1})
            .build()
    };

    db.collection::<mongodb::bson::Document>(collections::AIR_QUALITY)
        .create_index(reading_index(), None)
        .await?;
    db.collection::<mongodb::bson::Document>(collections::EXTERNAL_AIR_QUALITY)
        .create_index(reading_index(), None)
        .await?;
    db.collection::<mongodb::bson::Document>(collections::CONTRIBUTED_AIR_QUALITY)
        .create_index(
            IndexModel::builder()
                .keys(doc! {"contributionId": 1, "dateObserved.value": -1})
                .build(),
            None,
        )
        .await?;

    // One account per email address
    db.collection::<mongodb::bson::Document>(collections::USERS)
        .create_index(
            IndexModel::builder()
                .keys(doc! {"email": 1})
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            None,
        )
        .await?;

    info!("Database indexes ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names_are_distinct() {
        let names = [
            collections::AIR_QUALITY,
            collections::EXTERNAL_AIR_QUALITY,
            collections::CONTRIBUTED_AIR_QUALITY,
            collections::CONTRIBUTIONS,
            collections::STATIONS,
            collections::EXTERNAL_SOURCES,
            collections::EXTERNAL_MQTT_SOURCES,
            collections::USERS,
            collections::DEVICES,
        ];
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_database_config_shape() {
        let config = DatabaseConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "airwatch".to_string(),
            max_pool_size: 20,
            min_pool_size: 5,
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 5,
        };
        assert!(config.max_pool_size >= config.min_pool_size);
    }
}
