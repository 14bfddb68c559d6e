//! ISO-8601 timestamp (de)serialization for stored records
//!
//! Records are written as RFC 3339 in UTC with microsecond precision.
//! Reading also accepts naive timestamps without an offset (taken as UTC),
//! which older data files contain.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses an RFC 3339 or naive ISO-8601 timestamp
///
/// # Examples
///
/// ```
/// use site_indexer::storage::timestamp::parse;
///
/// assert!(parse("2024-03-01T12:30:00Z").is_some());
/// assert!(parse("2024-03-01T12:30:00.123456").is_some());
/// assert!(parse("yesterday").is_none());
/// ```
pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    })
}

/// Formats a timestamp the way it is stored
pub fn format(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// Reads an optional timestamp
///
/// `null` and unparseable strings both yield `None`; the caller fills the
/// gap with the load time.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| {
        let parsed = parse(&raw);
        if parsed.is_none() {
            tracing::warn!("Ignoring unparseable timestamp {:?}", raw);
        }
        parsed
    }))
}
