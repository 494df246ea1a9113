//! Parsing of the personal access token expiry header.
//!
//! GitHub attaches `github-authentication-token-expiration` to responses made
//! with a fine-grained or classic PAT that has an expiry date. The value is a
//! human-readable timestamp such as `2024-01-02 15:04:05 UTC`.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Response header carrying the token expiry timestamp.
pub const TOKEN_EXPIRATION_HEADER: &str = "github-authentication-token-expiration";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Abbreviations with a fixed offset (seconds east of UTC).
const ZONE_OFFSETS: &[(&str, i32)] = &[
    ("UTC", 0),
    ("GMT", 0),
    ("UT", 0),
    ("EST", -5 * 3600),
    ("EDT", -4 * 3600),
    ("CST", -6 * 3600),
    ("CDT", -5 * 3600),
    ("MST", -7 * 3600),
    ("MDT", -6 * 3600),
    ("PST", -8 * 3600),
    ("PDT", -7 * 3600),
    ("CET", 3600),
    ("CEST", 2 * 3600),
];

/// Errors produced while parsing the token expiry header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpiryParseError {
    #[error("'{0}' does not match 'YYYY-MM-DD HH:MM:SS ZONE'")]
    Format(String),

    #[error("'{value}' has an unrecognised zone '{zone}'")]
    Zone { value: String, zone: String },
}

/// Parses a token expiry header value into a UTC instant.
///
/// The zone is either a numeric offset (`+0200`) or an upper-case
/// abbreviation. Abbreviations in the fixed table get their standard offset
/// regardless of the host time zone; any other abbreviation is read as UTC.
/// GitHub itself only sends `UTC`.
pub fn parse_token_expiry(value: &str) -> Result<DateTime<Utc>, ExpiryParseError> {
    let value = value.trim();
    let format_err = || ExpiryParseError::Format(value.to_string());

    let (datetime, zone) = value.rsplit_once(' ').ok_or_else(format_err)?;
    let naive = NaiveDateTime::parse_from_str(datetime, DATETIME_FORMAT).map_err(|_| format_err())?;

    let offset = zone_offset(zone).ok_or_else(|| ExpiryParseError::Zone {
        value: value.to_string(),
        zone: zone.to_string(),
    })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(format_err)
}

fn zone_offset(zone: &str) -> Option<FixedOffset> {
    if let Some(digits) = zone.strip_prefix('+') {
        return numeric_offset(digits).and_then(FixedOffset::east_opt);
    }
    if let Some(digits) = zone.strip_prefix('-') {
        return numeric_offset(digits).and_then(FixedOffset::west_opt);
    }

    let is_abbreviation =
        (2..=5).contains(&zone.len()) && zone.chars().all(|c| c.is_ascii_uppercase());
    if !is_abbreviation {
        return None;
    }

    let secs = ZONE_OFFSETS
        .iter()
        .find(|(name, _)| *name == zone)
        .map(|(_, secs)| *secs)
        .unwrap_or(0);
    FixedOffset::east_opt(secs)
}

/// Parses `HHMM` into seconds.
fn numeric_offset(digits: &str) -> Option<i32> {
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 3600 + minutes * 60)
}
