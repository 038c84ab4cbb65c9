// Display formatting for loosely typed server timestamps.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

const TIME_FORMAT: &str = "%b %-d, %-I:%M %p";
const DATE_FORMAT: &str = "%b %-d, %Y";

// Anything below this is treated as seconds, above as milliseconds (year ~2286 in seconds).
const EPOCH_MILLIS_THRESHOLD: i64 = 10_000_000_000;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses RFC 3339, naive ISO date-times (assumed UTC), bare dates, or unix epoch digits.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let n: i64 = raw.parse().ok()?;
        let parsed = if n >= EPOCH_MILLIS_THRESHOLD {
            Utc.timestamp_millis_opt(n)
        } else {
            Utc.timestamp_opt(n, 0)
        };
        return parsed.single();
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// "Mar 5, 2:07 PM" in local time, or "" when the input is missing or unparseable.
pub fn format_timestamp(raw: Option<String>) -> String {
    format_timestamp_in(raw.as_deref(), &Local)
}

/// "Mar 5, 2024" in local time, or "".
pub fn format_date(raw: Option<String>) -> String {
    format_date_in(raw.as_deref(), &Local)
}

pub(crate) fn format_timestamp_in<Tz>(raw: Option<&str>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format_in(raw, tz, TIME_FORMAT)
}

pub(crate) fn format_date_in<Tz>(raw: Option<&str>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format_in(raw, tz, DATE_FORMAT)
}

fn format_in<Tz>(raw: Option<&str>, tz: &Tz, fmt: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    raw.and_then(parse_timestamp)
        .map(|dt| dt.with_timezone(tz).format(fmt).to_string())
        .unwrap_or_default()
}
