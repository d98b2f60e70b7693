//! Column codecs.
//!
//! Timestamps are stored as RFC 3339 UTC text with millisecond precision so
//! lexical order matches chronological order; days are `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

pub fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any RFC 3339 timestamp and normalize it to UTC.
pub fn decode_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn encode_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

pub fn decode_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Half-open `[start, end)` bounds of a UTC calendar day, encoded for range queries.
pub fn day_bounds(day: NaiveDate) -> (String, String) {
    let start = day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    let end = day
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc());
    match (start, end) {
        (Some(s), Some(e)) => (encode_ts(&s), encode_ts(&e)),
        // Only reachable at the edge of chrono's calendar range.
        _ => (encode_day(day), encode_day(day)),
    }
}

/// Map an optional text column through `decode_ts`, turning garbage into a
/// conversion error instead of silently dropping it.
pub(crate) fn ts_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => decode_ts(&raw).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("invalid timestamp: {raw}").into(),
            )
        }),
    }
}

pub(crate) fn required_ts_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<DateTime<Utc>> {
    ts_column(row, idx)?.ok_or(rusqlite::Error::InvalidColumnType(
        idx,
        "timestamp".to_string(),
        rusqlite::types::Type::Null,
    ))
}
