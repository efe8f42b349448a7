//! Reading retention background job.

use std::time::Duration;

use chrono::TimeDelta;
use mongodb::Database;
use tracing::info;

use persistence::repositories::{AirQualityRepository, ExternalAirQualityRepository};

use super::runner::Job;

/// Background job deleting readings past the retention window.
pub struct CleanupReadingsJob {
    air_quality: AirQualityRepository,
    external: ExternalAirQualityRepository,
    retention_days: u32,
}

impl CleanupReadingsJob {
    pub fn new(db: Database, retention_days: u32) -> Self {
        Self {
            air_quality: AirQualityRepository::new(db.clone()),
            external: ExternalAirQualityRepository::new(db),
            retention_days,
        }
    }
}

#[async_trait::async_trait]
impl Job for CleanupReadingsJob {
    fn name(&self) -> &'static str {
        "cleanup_readings"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn run(&self) -> anyhow::Result<()> {
        let cutoff = shared::time::now() - TimeDelta::days(self.retention_days as i64);

        let official = self.air_quality.delete_older_than(cutoff).await?;
        let external = self.external.delete_older_than(cutoff).await?;

        if official + external > 0 {
            info!(
                official = official,
                external = external,
                retention_days = self.retention_days,
                "Cleaned up expired readings"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hourly_interval() {
        // Retention sweeps hourly; more often buys nothing
        assert_eq!(Duration::from_secs(3600).as_secs(), 3600);
    }

    #[test]
    fn test_cutoff_arithmetic() {
        let now = shared::time::now();
        let cutoff = now - TimeDelta::days(365);
        assert!(cutoff < now);
        assert_eq!((now - cutoff).num_days(), 365);
    }
}
