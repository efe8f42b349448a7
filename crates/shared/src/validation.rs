//! Common validation utilities.

use chrono::{DateTime, Utc};
use validator::ValidationError;

/// Minimum allowed polling interval for external sources, in seconds.
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;

/// Maximum allowed polling interval for external sources, in seconds (24h).
pub const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates an external-source polling interval.
pub fn validate_poll_interval(secs: u64) -> Result<(), ValidationError> {
    if (MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS).contains(&secs) {
        Ok(())
    } else {
        let mut err = ValidationError::new("poll_interval_range");
        err.message = Some("Polling interval must be between 10 and 86400 seconds".into());
        Err(err)
    }
}

/// Validates a TCP port number (0 is reserved).
pub fn validate_port(port: u16) -> Result<(), ValidationError> {
    if port > 0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("port_range");
        err.message = Some("Port cannot be 0".into());
        Err(err)
    }
}

/// Validates that a URL is an absolute http(s) URL.
pub fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    let ok = (url.starts_with("http://") || url.starts_with("https://"))
        && url.len() > "https://".len()
        && !url.contains(char::is_whitespace);
    if ok {
        Ok(())
    } else {
        let mut err = ValidationError::new("http_url");
        err.message = Some("Must be an absolute http(s) URL".into());
        Err(err)
    }
}

/// Validates an observation window: `from` must be strictly before `to`.
pub fn validate_observation_window(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if from < to {
        Ok(())
    } else {
        let mut err = ValidationError::new("observation_window");
        err.message = Some("'from' must be strictly before 'to'".into());
        Err(err)
    }
}

/// Validates that a pollutant concentration is non-negative.
pub fn validate_concentration(value: f64) -> Result<(), ValidationError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        let mut err = ValidationError::new("concentration_range");
        err.message = Some("Concentration must be a non-negative finite number".into());
        Err(err)
    }
}
