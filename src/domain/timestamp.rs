//! Fixed-width timestamp encoding for stored documents.
//!
//! Every timestamp written to the document store uses
//! `YYYY-MM-DDTHH:MM:SS.mmmZ`, so lexical order of the stored strings equals
//! chronological order. Both the in-memory and PostgreSQL backends rely on
//! this when ordering query results by a timestamp field.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Returns the current time truncated to millisecond precision.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Formats a timestamp in the fixed-width stored form.
#[must_use]
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serializes a timestamp in the fixed-width stored form.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(ts))
}

/// Deserializes any RFC 3339 timestamp.
///
/// # Errors
///
/// Fails when the value is not a valid RFC 3339 string.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

/// Same encoding for optional timestamps.
pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes `Some(ts)` in the stored form and `None` as `null`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&super::format(ts)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Fails when a present value is not a valid RFC 3339 string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single();
        let Some(whole) = whole else {
            panic!("valid date");
        };
        assert_eq!(format(&whole), "2026-01-02T03:04:05.000Z");
        let later = whole + chrono::Duration::milliseconds(120);
        assert_eq!(format(&later), "2026-01-02T03:04:05.120Z");
        assert!(format(&whole) < format(&later));
    }

    #[test]
    fn now_has_millisecond_precision() {
        let ts = now();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
