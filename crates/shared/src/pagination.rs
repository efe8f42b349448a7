//! Cursor-based pagination utilities.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::time;

/// Error type for cursor operations.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Invalid cursor format")]
    InvalidFormat,
    #[error("Invalid cursor encoding")]
    InvalidEncoding,
    #[error("Invalid timestamp in cursor")]
    InvalidTimestamp,
    #[error("Invalid ID in cursor")]
    InvalidId,
}

/// Encodes a cursor from an observation timestamp and document id.
///
/// The cursor format is `base64(canonical_timestamp \n id)`. The composite
/// cursor handles readings with identical timestamps; a newline separator is
/// used because entity ids are NGSI URNs that themselves contain colons.
pub fn encode_cursor(observed_at: DateTime<Utc>, id: &str) -> String {
    let raw = format!("{}\n{}", time::to_canonical(observed_at), id);
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Decodes a cursor into `(timestamp, id)`.
pub fn decode_cursor(cursor: &str) -> Result<(DateTime<Utc>, String), CursorError> {
    let decoded = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| CursorError::InvalidEncoding)?;

    let s = String::from_utf8(decoded).map_err(|_| CursorError::InvalidFormat)?;

    let (timestamp_str, id) = s.split_once('\n').ok_or(CursorError::InvalidFormat)?;

    if id.is_empty() {
        return Err(CursorError::InvalidId);
    }

    let timestamp =
        time::parse_canonical(timestamp_str).map_err(|_| CursorError::InvalidTimestamp)?;

    Ok((timestamp, id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encode_decode_cursor_roundtrip() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let id = "urn:ngsi-ld:AirQualityObserved:ljubljana-center:2024-01-15";

        let cursor = encode_cursor(timestamp, id);
        let (decoded_ts, decoded_id) = decode_cursor(&cursor).unwrap();

        assert_eq!(decoded_ts, timestamp);
        assert_eq!(decoded_id, id);
    }

    #[test]
    fn test_id_with_colons_survives() {
        let timestamp = Utc.with_ymd_and_hms(2024, 6, 15, 14, 30, 45).unwrap();
        let id = "urn:ngsi-ld:AirQualityObserved:a:b:c";

        let cursor = encode_cursor(timestamp, id);
        let (_, decoded_id) = decode_cursor(&cursor).unwrap();
        assert_eq!(decoded_id, id);
    }

    #[test]
    fn test_decode_invalid_base64() {
        let result = decode_cursor("not-valid-base64!!!");
        assert!(matches!(result, Err(CursorError::InvalidEncoding)));
    }

    #[test]
    fn test_decode_missing_separator() {
        let invalid = URL_SAFE_NO_PAD.encode(b"no-separator-here");
        let result = decode_cursor(&invalid);
        assert!(matches!(result, Err(CursorError::InvalidFormat)));
    }

    #[test]
    fn test_decode_empty_id() {
        let invalid = URL_SAFE_NO_PAD.encode(b"2024-01-15T10:30:00.000Z\n");
        let result = decode_cursor(&invalid);
        assert!(matches!(result, Err(CursorError::InvalidId)));
    }

    #[test]
    fn test_decode_invalid_timestamp() {
        let invalid = URL_SAFE_NO_PAD.encode(b"not-a-timestamp\nsome-id");
        let result = decode_cursor(&invalid);
        assert!(matches!(result, Err(CursorError::InvalidTimestamp)));
    }

    #[test]
    fn test_cursor_is_url_safe() {
        let cursor = encode_cursor(Utc::now(), "urn:ngsi-ld:AirQualityObserved:x");

        // URL_SAFE_NO_PAD should not contain +, /, or =
        assert!(!cursor.contains('+'));
        assert!(!cursor.contains('/'));
        assert!(!cursor.contains('='));
    }

    #[test]
    fn test_timestamp_truncated_to_millis() {
        let timestamp = Utc
            .with_ymd_and_hms(2024, 1, 15, 10, 30, 0)
            .unwrap()
            .checked_add_signed(chrono::TimeDelta::nanoseconds(123_456_789))
            .unwrap();
        let cursor = encode_cursor(timestamp, "urn:x");
        let (decoded_ts, _) = decode_cursor(&cursor).unwrap();
        assert_eq!(decoded_ts.timestamp_subsec_millis(), 123);
    }
}
