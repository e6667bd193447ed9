//! Shared parsing utilities for utility outage feeds.
//!
//! Common date, number and coordinate parsing functions used across
//! multiple adapter implementations. Every helper returns `None` for
//! missing or malformed input instead of failing, so adapters can decide
//! whether a bad field skips the entry or is merely left empty.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use outage_map_outage_models::Ring;

/// Canonical timestamp format used when outage times are rendered as text.
pub const OUTPUT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Full PSE timestamp format once the year has been prepended, e.g.
/// `"2025/02/24 06:30 PM"`.
const PSE_LOCAL_TIME_FORMAT: &str = "%Y/%m/%d %I:%M %p";

/// PSE strings at most this long cannot contain a year.
const PSE_YEARLESS_MAX_LEN: usize = 14;

/// Fixed Pacific offset applied to PSE times. Daylight saving is not
/// modeled.
const PSE_UTC_OFFSET_HOURS: i32 = 8;

/// Parses a PSE local timestamp (`"MM/DD hh:mm AM"`, optionally already
/// prefixed with `"YYYY/"`) into UTC.
///
/// When the string is short enough that it cannot carry a year, the
/// snapshot year is prepended before parsing.
#[must_use]
pub fn parse_pse_local_time(raw: &str, snapshot_year: i32) -> Option<DateTime<Utc>> {
    let full = if raw.chars().count() <= PSE_YEARLESS_MAX_LEN {
        format!("{snapshot_year}/{raw}")
    } else {
        raw.to_string()
    };

    let naive = NaiveDateTime::parse_from_str(&full, PSE_LOCAL_TIME_FORMAT).ok()?;
    let pacific = FixedOffset::west_opt(PSE_UTC_OFFSET_HOURS * 3600)?;
    naive
        .and_local_timezone(pacific)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Converts epoch milliseconds to a UTC timestamp.
#[must_use]
pub fn epoch_ms_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Parses a textual timestamp into UTC.
///
/// Accepts RFC 3339 (any offset, converted to UTC) as well as naive
/// `"YYYY-MM-DD HH:MM:SS"` / `"YYYY-MM-DDTHH:MM:SS[.f]"` strings, which are
/// taken to already be UTC. The placeholder `"none"` and empty strings
/// yield `None`.
#[must_use]
pub fn parse_utc_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("none") {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, OUTPUT_TIME_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    None
}

/// Formats a timestamp with [`OUTPUT_TIME_FORMAT`].
#[must_use]
pub fn format_time(dt: &DateTime<Utc>) -> String {
    dt.format(OUTPUT_TIME_FORMAT).to_string()
}

/// Builds the identifier used for feeds without stable outage ids: the
/// formatted start time with `:`, space and `-` removed
/// (`"2025-01-15 13:26:42"` becomes `"20250115132642"`).
#[must_use]
pub fn start_time_key(start: &DateTime<Utc>) -> String {
    format_time(start)
        .chars()
        .filter(|c| !matches!(c, ':' | ' ' | '-'))
        .collect()
}

/// Reads a JSON value as a string. Numbers are converted to their decimal
/// representation; `null` and other types yield `None`.
#[must_use]
pub fn value_as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a JSON value as a finite `f64`, accepting numeric strings.
#[must_use]
pub fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Reads a JSON value as an `i64`, accepting numeric strings and
/// truncating fractional numbers.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn value_as_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// Reads a JSON value as a non-negative customer count.
#[must_use]
pub fn value_as_count(value: &serde_json::Value) -> Option<u64> {
    value_as_i64(value).and_then(|n| u64::try_from(n).ok())
}

/// Reads a `[lon, lat, ...]` JSON array as a point. Extra elements (e.g.
/// altitude) are ignored.
#[must_use]
pub fn point_from_value(value: &serde_json::Value) -> Option<[f64; 2]> {
    let coords = value.as_array()?;
    let lon = value_as_f64(coords.first()?)?;
    let lat = value_as_f64(coords.get(1)?)?;
    Some([lon, lat])
}

/// Reads a JSON array of `[lon, lat]` points as a ring, skipping malformed
/// points.
#[must_use]
pub fn ring_from_value(value: &serde_json::Value) -> Ring {
    value
        .as_array()
        .map(|points| points.iter().filter_map(point_from_value).collect())
        .unwrap_or_default()
}

/// Parses a KML `<coordinates>` string (`"lon,lat[,alt] lon,lat[,alt] ..."`)
/// into a ring. Malformed tokens are skipped.
#[must_use]
pub fn parse_kml_coordinates(text: &str) -> Ring {
    text.split_whitespace()
        .filter_map(|token| {
            let mut parts = token.split(',');
            let lon = parts.next()?.parse::<f64>().ok()?;
            let lat = parts.next()?.parse::<f64>().ok()?;
            Some([lon, lat])
        })
        .collect()
}
