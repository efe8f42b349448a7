//! Persistence layer for the AirWatch backend.
//!
//! This crate contains:
//! - MongoDB client and database handle construction
//! - Startup index bootstrap
//! - Repository implementations, one per collection

pub mod db;
pub mod metrics;
pub mod repositories;
