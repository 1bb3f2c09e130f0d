//! Lenient parsing for Jira timestamps.
//!
//! Jira sends `2024-01-15T10:30:00.000+0300`. A single bad date must never
//! fail a whole response, so these helpers accept any JSON value and fall back
//! to absence (nullable fields) or [`unknown_timestamp`] (required fields).

use crate::types::unknown_timestamp;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const JIRA_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Parses a timestamp, trying the Jira format first and then ISO-8601 variants.
///
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DateTime::parse_from_str(raw, JIRA_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
                .map(|naive| naive.and_utc().fixed_offset())
        })
}

fn from_value(value: Option<Value>) -> Option<DateTime<FixedOffset>> {
    match value {
        Some(Value::String(raw)) => {
            let parsed = parse_timestamp(&raw);
            if parsed.is_none() {
                tracing::debug!(value = %raw, "Unparsable Jira timestamp");
            }
            parsed
        }
        _ => None,
    }
}

/// `serde(deserialize_with)` helper for nullable timestamps.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Deserialize::deserialize(deserializer)?;
    Ok(from_value(value))
}

/// `serde(deserialize_with)` helper for required timestamps.
pub fn deserialize_required<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Deserialize::deserialize(deserializer)?;
    Ok(from_value(value).unwrap_or_else(unknown_timestamp))
}
