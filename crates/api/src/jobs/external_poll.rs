//! External HTTP source polling job.
//!
//! Every tick, active sources whose own interval has elapsed are fetched:
//! GET the configured URL, normalize the body, store the readings and
//! rebroadcast them. A failed poll bumps the source's failure counter; at
//! the configured threshold the source is flipped inactive until someone
//! calls the reactivate endpoint. No backoff, no jitter, no dedup.

use std::time::Duration;

use mongodb::Database;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info, warn};

use domain::models::ExternalSource;
use domain::services::normalization;
use persistence::repositories::{ExternalAirQualityRepository, ExternalSourceRepository};

use super::runner::Job;
use crate::config::PollingConfig;
use crate::middleware::metrics::{record_poll, record_reading_stored};
use crate::services::hub::{EventHub, NEW_EXTERNAL_AIR_QUALITY};

/// Background job polling registered external HTTP sources.
pub struct ExternalPollJob {
    sources: ExternalSourceRepository,
    readings: ExternalAirQualityRepository,
    hub: EventHub,
    http: reqwest::Client,
    tick: Duration,
    failure_threshold: u32,
}

impl ExternalPollJob {
    pub fn new(db: Database, hub: EventHub, config: &PollingConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("airwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            sources: ExternalSourceRepository::new(db.clone()),
            readings: ExternalAirQualityRepository::new(db),
            hub,
            http,
            tick: Duration::from_secs(config.tick_secs),
            failure_threshold: config.failure_threshold,
        }
    }

    /// Fetch one source and store whatever normalizes. Returns the number
    /// of stored readings.
    async fn poll_source(&self, source: &ExternalSource) -> anyhow::Result<usize> {
        let mut headers = HeaderMap::new();
        for (name, value) in &source.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(source_id = %source.id, header = %name, "Skipping invalid header"),
            }
        }

        let body: serde_json::Value = self
            .http
            .get(&source.url)
            .headers(headers)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let batch = normalization::normalize_payload(&body, &source.station_id)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        if batch.dropped > 0 {
            debug!(
                source_id = %source.id,
                dropped = batch.dropped,
                "Dropped unusable entities from polled payload"
            );
        }

        let stored = self.readings.insert_many(&batch.readings).await?;
        for reading in &batch.readings {
            record_reading_stored("poll");
            self.hub.publish(NEW_EXTERNAL_AIR_QUALITY, reading);
        }

        Ok(stored)
    }

    /// Record a failed poll and auto-deactivate at the threshold.
    async fn handle_failure(&self, source: &ExternalSource, error: &anyhow::Error) {
        warn!(
            source_id = %source.id,
            url = %source.url,
            error = %error,
            "Poll failed"
        );
        record_poll("failure");

        let updated = match self.sources.record_failure(&source.id).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "Failed to record poll failure");
                return;
            }
        };

        if let Some(updated) = updated {
            if updated.active && updated.failure_count >= self.failure_threshold {
                match self.sources.deactivate(&updated.id).await {
                    Ok(()) => warn!(
                        source_id = %updated.id,
                        failures = updated.failure_count,
                        "Source auto-deactivated after repeated failures"
                    ),
                    Err(e) => {
                        warn!(source_id = %updated.id, error = %e, "Failed to deactivate source")
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Job for ExternalPollJob {
    fn name(&self) -> &'static str {
        "external_poll"
    }

    fn interval(&self) -> Duration {
        self.tick
    }

    async fn run(&self) -> anyhow::Result<()> {
        let now = shared::time::now();
        let due: Vec<ExternalSource> = self
            .sources
            .find_active()
            .await?
            .into_iter()
            .filter(|source| source.is_due(now))
            .collect();

        if due.is_empty() {
            return Ok(());
        }
        debug!(count = due.len(), "Polling due external sources");

        for source in due {
            self.sources
                .mark_polled(&source.id, shared::time::now())
                .await?;

            match self.poll_source(&source).await {
                Ok(stored) => {
                    record_poll("success");
                    self.sources
                        .record_success(&source.id, shared::time::now())
                        .await?;
                    info!(source_id = %source.id, stored = stored, "Poll completed");
                }
                Err(e) => self.handle_failure(&source, &e).await,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_name() {
        let name = "external_poll";
        assert_eq!(name, "external_poll");
    }

    #[test]
    fn test_default_threshold_is_conservative() {
        // The default must tolerate transient upstream hiccups
        let threshold: u32 = 5;
        assert!(threshold >= 3);
    }
}
