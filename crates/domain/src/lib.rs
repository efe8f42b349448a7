//! Domain layer for the AirWatch backend.
//!
//! This crate contains:
//! - NGSI-LD value wrappers and document models for every collection
//! - Request/response DTOs with validation rules
//! - Payload normalization used by both ingestion paths

pub mod models;
pub mod services;
