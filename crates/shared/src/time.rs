//! Canonical timestamp handling.
//!
//! Every timestamp the system persists goes through this module. Timestamps
//! are rendered as RFC 3339 UTC with exactly millisecond precision, so the
//! stored string form compares lexicographically in chronological order and
//! MongoDB range filters on `dateObserved.value` behave like time ranges.

use chrono::{DateTime, DurationRound, SecondsFormat, TimeDelta, Utc};

/// Current time truncated to millisecond precision.
pub fn now() -> DateTime<Utc> {
    truncate(Utc::now())
}

/// Truncates a timestamp to millisecond precision.
///
/// Truncation (rather than rounding) keeps a truncated value always `<=`
/// the original, which matters for "newer than" comparisons on ingest.
pub fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::milliseconds(1)).unwrap_or(ts)
}

/// Formats a timestamp in the canonical stored form.
pub fn to_canonical(ts: DateTime<Utc>) -> String {
    truncate(ts).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 timestamp (any offset) into canonical UTC form.
pub fn parse_canonical(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|ts| truncate(ts.with_timezone(&Utc)))
}

/// Serde adapter serializing `DateTime<Utc>` in the canonical form.
///
/// Use as `#[serde(with = "shared::time::canonical")]` on document fields.
pub mod canonical {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_canonical(*ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_canonical(&s).map_err(de::Error::custom)
    }
}

/// Serde adapter for optional timestamps in the canonical form.
///
/// Use as `#[serde(with = "shared::time::canonical_opt")]`.
pub mod canonical_opt {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match ts {
            Some(ts) => serializer.serialize_some(&to_canonical(*ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => parse_canonical(&s).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_canonical_has_millisecond_precision() {
        let ts = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 30, 45)
            .unwrap()
            .checked_add_signed(TimeDelta::nanoseconds(123_456_789))
            .unwrap();
        assert_eq!(to_canonical(ts), "2024-03-01T12:30:45.123Z");
    }

    #[test]
    fn test_canonical_whole_seconds_keep_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(to_canonical(ts), "2024-03-01T00:00:00.000Z");
    }

    #[test]
    fn test_lexicographic_order_matches_chronological() {
        let earlier = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .unwrap()
            .checked_add_signed(TimeDelta::milliseconds(500))
            .unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 1).unwrap();
        assert!(to_canonical(earlier) < to_canonical(later));
    }

    #[test]
    fn test_parse_normalizes_offset_to_utc() {
        let ts = parse_canonical("2024-03-01T14:30:00.000+02:00").unwrap();
        assert_eq!(to_canonical(ts), "2024-03-01T12:30:00.000Z");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_canonical("not-a-timestamp").is_err());
        assert!(parse_canonical("2024-13-01T00:00:00Z").is_err());
    }

    #[test]
    fn test_roundtrip() {
        let ts = now();
        let parsed = parse_canonical(&to_canonical(ts)).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_serde_adapter() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Doc {
            #[serde(with = "canonical")]
            at: DateTime<Utc>,
        }

        let doc = Doc {
            at: Utc.with_ymd_and_hms(2024, 6, 1, 8, 15, 0).unwrap(),
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"at":"2024-06-01T08:15:00.000Z"}"#);

        let back: Doc = serde_json::from_str(&json).unwrap();
        assert_eq!(back.at, doc.at);
    }
}
