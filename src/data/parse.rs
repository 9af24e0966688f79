use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::Column;

use crate::error::{DataError, DayAheadResult, frame_error};

/// Days between 0001-01-01 (CE) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%:z"];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a timestamp into microseconds since the Unix epoch on the UTC axis.
///
/// Strings carrying an offset (`2015-03-29 03:00:00+02:00`) are converted to UTC.
/// Strings without one are taken as UTC wall time.
pub fn parse_timestamp_utc(raw: &str) -> Option<i64> {
    let s = raw.trim();
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc).timestamp_micros());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).timestamp_micros());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|ndt| ndt.and_utc().timestamp_micros())
}

/// Parses a calendar date trying each format in order.
pub fn parse_date(raw: &str, formats: &[&str]) -> Option<NaiveDate> {
    let s = raw.trim();
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parses a locale-formatted decimal.
///
/// Returns `Ok(None)` for an empty cell or a `nan` marker and `Err(())` for anything
/// that is not a number.
pub(crate) fn parse_price(raw: &str, decimal_comma: bool) -> Result<Option<f64>, ()> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let parsed = if decimal_comma {
        s.replace(',', ".").parse::<f64>()
    } else {
        s.parse::<f64>()
    };
    match parsed {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(()),
    }
}

pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

pub fn micros_to_naive(us: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp_micros(us).map(|dt| dt.naive_utc())
}

pub fn naive_to_micros(ndt: NaiveDateTime) -> i64 {
    ndt.and_utc().timestamp_micros()
}

// ================================================================================================
// Column Parsers
// ================================================================================================

fn str_values<'a>(column: &'a Column, stage: &str) -> DayAheadResult<Vec<Option<&'a str>>> {
    let ca = column.str().map_err(|e| frame_error(stage, e))?;
    Ok(ca.into_iter().collect())
}

/// Parses a string column of timestamps. Empty cells are rejected since the
/// timestamp is the row key.
pub fn timestamp_column(column: &Column) -> DayAheadResult<Vec<i64>> {
    let name = column.name().to_string();
    str_values(column, "reading timestamp column")?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let value = value.ok_or_else(|| DataError::MissingKey {
                column: name.clone(),
                row,
            })?;
            parse_timestamp_utc(value).ok_or_else(|| {
                DataError::ParseTimestamp {
                    column: name.clone(),
                    row,
                    value: value.to_string(),
                }
                .into()
            })
        })
        .collect()
}

/// Parses a string column of calendar dates into days since the Unix epoch.
pub fn date_column(column: &Column, formats: &[&str]) -> DayAheadResult<Vec<i32>> {
    let name = column.name().to_string();
    str_values(column, "reading date column")?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let value = value.ok_or_else(|| DataError::MissingKey {
                column: name.clone(),
                row,
            })?;
            parse_date(value, formats)
                .map(date_to_days)
                .ok_or_else(|| {
                    DataError::ParseDate {
                        column: name.clone(),
                        row,
                        value: value.to_string(),
                    }
                    .into()
                })
        })
        .collect()
}

/// Parses a string column of prices. Empty cells become missing values, malformed
/// numbers fail the whole column.
pub fn price_column(column: &Column, decimal_comma: bool) -> DayAheadResult<Vec<Option<f64>>> {
    let name = column.name().to_string();
    str_values(column, "reading price column")?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            None => Ok(None),
            Some(v) => parse_price(v, decimal_comma).map_err(|_| {
                DataError::ParsePrice {
                    column: name.clone(),
                    row,
                    value: v.to_string(),
                }
                .into()
            }),
        })
        .collect()
}
