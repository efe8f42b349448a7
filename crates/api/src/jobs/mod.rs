//! Background jobs and their runner.

mod cleanup_readings;
mod external_poll;
mod runner;

pub use cleanup_readings::CleanupReadingsJob;
pub use external_poll::ExternalPollJob;
pub use runner::{Job, JobRunner};
