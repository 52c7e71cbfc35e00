//! Best-effort report-date handling.
//!
//! Accepted shapes, in priority order: ISO `YYYY-MM-DD` (a trailing time part
//! separated by `T` or a space is discarded), compact `YYYYMMDD`, and
//! `YYYY/MM/DD`. Anything else is left to the caller as opaque text.

use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use crate::{
    data::{RawRecord, Value, coerce_text},
    matching::CandidateSet,
};

/// Accepts `d` for an ASCII digit and any other byte literally.
fn has_shape(value: &[u8], shape: &[u8]) -> bool {
    value.len() == shape.len()
        && value.iter().zip(shape).all(|(byte, expected)| match expected {
            b'd' => byte.is_ascii_digit(),
            other => byte == other,
        })
}

pub fn parse_report_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim().trim_matches(|c| matches!(c, '\'' | '"'));
    let bytes = trimmed.as_bytes();

    if bytes.len() >= 10 && has_shape(&bytes[..10], b"dddd-dd-dd") {
        let rest = &bytes[10..];
        if rest.is_empty() || matches!(rest[0], b'T' | b't' | b' ') {
            return date_from_parts(&trimmed[0..4], &trimmed[5..7], &trimmed[8..10]);
        }
        return None;
    }
    if has_shape(bytes, b"dddddddd") {
        return date_from_parts(&trimmed[0..4], &trimmed[4..6], &trimmed[6..8]);
    }
    if has_shape(bytes, b"dddd/dd/dd") {
        return date_from_parts(&trimmed[0..4], &trimmed[5..7], &trimmed[8..10]);
    }
    None
}

fn date_from_parts(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Canonical form of a date cell: a parsed date, the original text when the
/// shape is unrecognised, or null when there is nothing to parse.
pub fn canonical_date(raw: Option<&JsonValue>) -> Value {
    match coerce_text(raw) {
        None => Value::Null,
        Some(text) if text.trim().is_empty() => Value::Null,
        Some(text) => match parse_report_date(&text) {
            Some(date) => Value::Date(date),
            None => Value::Text(text),
        },
    }
}

fn record_date(record: &RawRecord, matcher: &CandidateSet) -> Option<NaiveDate> {
    let key = matcher.pick(record)?;
    coerce_text(record.get(key)).and_then(|text| parse_report_date(&text))
}

/// Latest parseable report date across a batch.
pub fn latest_date(records: &[RawRecord], matcher: &CandidateSet) -> Option<NaiveDate> {
    records
        .iter()
        .filter_map(|record| record_date(record, matcher))
        .max()
}

/// Keeps only records whose report date equals `target`. Records without a
/// parseable date are dropped.
pub fn filter_by_date(
    records: Vec<RawRecord>,
    matcher: &CandidateSet,
    target: NaiveDate,
) -> Vec<RawRecord> {
    records
        .into_iter()
        .filter(|record| record_date(record, matcher) == Some(target))
        .collect()
}
