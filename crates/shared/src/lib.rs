//! Shared utilities and common types for the AirWatch backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Canonical timestamp formatting
//! - Station slug generation
//! - Password hashing with Argon2id
//! - Common validation logic
//! - Cursor pagination

pub mod pagination;
pub mod password;
pub mod slug;
pub mod time;
pub mod validation;
