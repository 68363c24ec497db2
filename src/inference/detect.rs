//! Value detectors used by type inference and coercion.
//!
//! Each `is_*` function answers whether a piece of text can be read as the
//! given type; the matching `parse_*` function performs the read.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("Invalid regex"));
static RE_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("Invalid regex")
});

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y"];
const TIME_FORMATS: [&str; 3] = ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// `true` or `false`, case-insensitive
pub fn is_boolean(text: &str) -> bool {
    parse_boolean(text).is_some()
}

pub fn parse_boolean(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Whole number that fits an `i64`
pub fn is_integer(text: &str) -> bool {
    parse_integer(text).is_some()
}

pub fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    if !RE_INTEGER.is_match(text) {
        return None;
    }
    text.trim_start_matches('+').parse().ok()
}

/// Plain decimal number, optionally with an exponent
///
/// `inf`, `NaN` and similar spellings that `f64::from_str` accepts are not
/// numbers here.
pub fn is_numeric(text: &str) -> bool {
    parse_numeric(text).is_some()
}

pub fn parse_numeric(text: &str) -> Option<f64> {
    let text = text.trim();
    if !RE_NUMERIC.is_match(text) {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn is_date(text: &str) -> bool {
    parse_date(text).is_some()
}

/// Calendar date; ISO order first, then day-first forms
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Time of day such as `14:30`, `5:12` or `14:30:15`
pub fn is_time(text: &str) -> bool {
    parse_time(text).is_some()
}

pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
}

/// Date with a time of day; RFC 3339 or an ISO form without offset (UTC)
pub fn is_datetime(text: &str) -> bool {
    parse_datetime(text).is_some()
}

pub fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
}
