use std::{cmp::Reverse, fmt, path::Path};

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use polars::{
    frame::DataFrame,
    prelude::{IntoLazy, SortMultipleOptions, col},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    config::MarketKind,
    data::{
        columns::{MarketCol, naive_datetime},
        frame::{datetime_column, datetime_micros, f64_column, f64_values},
        market::aggregate_wind,
        merge::MergedFeatureTable,
        parse,
    },
    error::{DataError, DayAheadError, DayAheadResult, frame_error},
    io::{self, Table},
};

/// Number of offending rows listed for a mismatching field.
const WORST_ROWS: usize = 5;

/// Merged fields compared against the raw extract, in report order.
const CHECKED_FIELDS: [MarketCol; 4] = [
    MarketCol::DayAheadPrice,
    MarketCol::LoadForecast,
    MarketCol::SolarForecast,
    MarketCol::WindAggregate,
];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, IntoStaticStr,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum FieldStatus {
    Ok,
    Mismatch,
    /// The raw column is absent or no row could be compared.
    Skipped,
}

/// A single row where merged and raw values disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offender {
    pub timestamp: NaiveDateTime,
    pub merged: f64,
    pub raw: f64,
    pub abs_diff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCheck {
    pub field: MarketCol,
    pub status: FieldStatus,
    /// Rows where both sides hold a value.
    pub compared_rows: usize,
    pub mae: Option<f64>,
    pub within_tolerance_pct: Option<f64>,
    pub offending_rows: usize,
    /// Largest absolute differences first; only filled on mismatch.
    pub worst: Vec<Offender>,
}

impl FieldCheck {
    fn skipped(field: MarketCol) -> Self {
        Self {
            field,
            status: FieldStatus::Skipped,
            compared_rows: 0,
            mae: None,
            within_tolerance_pct: None,
            offending_rows: 0,
            worst: Vec::new(),
        }
    }

    fn compare(
        field: MarketCol,
        stamps: &[i64],
        merged: &[Option<f64>],
        raw: &[Option<f64>],
        tolerance: f64,
    ) -> Self {
        let diffs: Vec<(i64, f64, f64, f64)> = stamps
            .iter()
            .zip(merged.iter().zip(raw))
            .filter_map(|(ts, pair)| match pair {
                (Some(m), Some(r)) => Some((*ts, *m, *r, (m - r).abs())),
                _ => None,
            })
            .collect();
        if diffs.is_empty() {
            return Self::skipped(field);
        }

        let n = diffs.len();
        let mae = diffs.iter().map(|d| d.3).sum::<f64>() / n as f64;
        let within = diffs.iter().filter(|d| d.3 < tolerance).count();
        let status = if mae < tolerance {
            FieldStatus::Ok
        } else {
            FieldStatus::Mismatch
        };

        let worst = if status == FieldStatus::Mismatch {
            let mut ranked = diffs.clone();
            ranked.sort_by_key(|d| (Reverse(OrderedFloat(d.3)), d.0));
            ranked
                .into_iter()
                .take(WORST_ROWS)
                .filter_map(|(ts, merged, raw, abs_diff)| {
                    parse::micros_to_naive(ts).map(|timestamp| Offender {
                        timestamp,
                        merged,
                        raw,
                        abs_diff,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            field,
            status,
            compared_rows: n,
            mae: Some(mae),
            within_tolerance_pct: Some(within as f64 / n as f64 * 100.0),
            offending_rows: n - within,
            worst,
        }
    }
}

/// Row-for-row comparison of a merged table with the raw extract it came from.
///
/// Diagnostic only: mismatches are reported, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub market: MarketKind,
    pub tolerance: f64,
    /// Rows present in both tables.
    pub joined_rows: usize,
    /// First and last joined timestamp.
    pub overlap: Option<(NaiveDateTime, NaiveDateTime)>,
    pub checks: Vec<FieldCheck>,
}

impl ValidationReport {
    /// Reloads the raw extract from disk and compares it with `merged`.
    #[tracing::instrument(skip(merged), fields(market = %merged.market()))]
    pub fn from_raw_csv(
        raw_path: &Path,
        merged: &MergedFeatureTable,
        tolerance: f64,
    ) -> DayAheadResult<Self> {
        let raw = io::read_csv_strings(raw_path, b',')?;
        let report = Self::compare(merged.market(), &raw, merged.as_df(), tolerance)?;
        for check in &report.checks {
            match check.status {
                FieldStatus::Ok => tracing::info!(field = %check.field, mae = check.mae, "Validation OK"),
                FieldStatus::Mismatch => tracing::warn!(
                    field = %check.field,
                    mae = check.mae,
                    offending = check.offending_rows,
                    "Validation mismatch"
                ),
                FieldStatus::Skipped => tracing::warn!(field = %check.field, "Validation skipped"),
            }
        }
        Ok(report)
    }

    /// Compares a raw extract (all columns as strings, offset timestamps in the first
    /// column) with a merged frame indexed by naive UTC timestamps.
    pub fn compare(
        market: MarketKind,
        raw: &DataFrame,
        merged: &DataFrame,
        tolerance: f64,
    ) -> DayAheadResult<Self> {
        let raw_frame = raw_reference(market, raw)?;
        let ts = MarketCol::Timestamp.as_str();

        let mut selection = vec![col(ts)];
        selection.extend(CHECKED_FIELDS.iter().map(|f| col(*f)));
        let joined = merged
            .clone()
            .lazy()
            .select(selection)
            .inner_join(raw_frame.clone().lazy(), col(ts), col(ts))
            .sort([ts], SortMultipleOptions::default())
            .collect()
            .map_err(convert_err)?;

        let stamps = datetime_micros(&joined, ts)?;
        let overlap = match (stamps.first(), stamps.last()) {
            (Some(first), Some(last)) => {
                parse::micros_to_naive(*first).zip(parse::micros_to_naive(*last))
            }
            _ => None,
        };

        let mut checks = Vec::with_capacity(CHECKED_FIELDS.len());
        for field in CHECKED_FIELDS {
            let raw_name = raw_column_name(field);
            if raw_frame.column(&raw_name).is_err() {
                checks.push(FieldCheck::skipped(field));
                continue;
            }
            let merged_values = f64_values(&joined, field.as_str())?;
            let raw_values = f64_values(&joined, &raw_name)?;
            checks.push(FieldCheck::compare(
                field,
                &stamps,
                &merged_values,
                &raw_values,
                tolerance,
            ));
        }

        Ok(Self {
            market,
            tolerance,
            joined_rows: joined.height(),
            overlap,
            checks,
        })
    }

    /// True when no field mismatches. Skipped fields do not count against it.
    pub fn all_ok(&self) -> bool {
        self.checks
            .iter()
            .all(|c| c.status != FieldStatus::Mismatch)
    }

    pub fn check(&self, field: MarketCol) -> Option<&FieldCheck> {
        self.checks.iter().find(|c| c.field == field)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Validation: {} ===", self.market)?;
        match self.overlap {
            Some((first, last)) => writeln!(
                f,
                "Overlap: {} .. {} ({} joined rows)",
                first.date(),
                last.date(),
                self.joined_rows
            )?,
            None => writeln!(f, "Overlap: none (0 joined rows)")?,
        }
        for check in &self.checks {
            match (check.mae, check.within_tolerance_pct) {
                (Some(mae), Some(pct)) => writeln!(
                    f,
                    "{:<16} {:<8} MAE={:.6} within ±{}: {:.2}% offending={}",
                    check.field.as_str(),
                    check.status,
                    mae,
                    self.tolerance,
                    pct,
                    check.offending_rows
                )?,
                _ => writeln!(f, "{:<16} {}", check.field.as_str(), check.status)?,
            }
            for o in &check.worst {
                writeln!(
                    f,
                    "    {}  merged={:.4}  raw={:.4}  |diff|={:.4}",
                    o.timestamp, o.merged, o.raw, o.abs_diff
                )?;
            }
        }
        Ok(())
    }
}

fn raw_column_name(field: MarketCol) -> String {
    format!("raw_{}", field.as_str())
}

/// Reconstructs the merged fields from the raw extract on a naive UTC axis. Fields
/// whose raw source column is absent are left out.
fn raw_reference(market: MarketKind, raw: &DataFrame) -> DayAheadResult<DataFrame> {
    let schema = market.schema();
    let ts_raw = raw
        .get_columns()
        .first()
        .ok_or_else(|| DataError::MissingColumn {
            column: "timestamp".to_string(),
            source_name: format!("{market} extract"),
        })?;
    let stamps = parse::timestamp_column(ts_raw)?;

    let lookup = |name: &str| -> DayAheadResult<Option<Vec<Option<f64>>>> {
        raw.column(name)
            .ok()
            .map(|c| parse::price_column(c, false))
            .transpose()
    };

    let mut columns = vec![datetime_column(
        MarketCol::Timestamp.as_str(),
        stamps,
        &naive_datetime(),
    )?];
    for field in CHECKED_FIELDS {
        let values = match field {
            MarketCol::DayAheadPrice => lookup(schema.price)?,
            MarketCol::LoadForecast => lookup(schema.load_forecast)?,
            MarketCol::SolarForecast => lookup(schema.solar_forecast)?,
            MarketCol::WindAggregate if raw.column(schema.onshore_wind).is_ok() => {
                Some(aggregate_wind(&schema, lookup)?)
            }
            _ => None,
        };
        if let Some(values) = values {
            columns.push(f64_column(&raw_column_name(field), values));
        }
    }
    DataFrame::new(columns).map_err(convert_err)
}

fn convert_err(e: polars::error::PolarsError) -> DayAheadError {
    frame_error("validating merged table", e)
}
