//! Repairs the calendar irregularities daylight-saving transitions leave in an hourly
//! series: repeated instants at fall-back and missing instants at spring-forward.

use std::cmp::Reverse;

use itertools::Itertools;
use polars::prelude::{
    BooleanChunked, DataFrame, Expr, IntoLazy, SortMultipleOptions, col, lit, when,
};

use crate::{
    data::frame::{datetime_column, datetime_micros},
    error::{DayAheadError, DayAheadResult, frame_error},
};

/// Result of [`normalize_dst_transitions`].
#[derive(Debug, Clone)]
pub struct DstRepair {
    /// Series on a strictly regular grid.
    pub df: DataFrame,
    /// Sampling step inferred from the input, in microseconds.
    pub step_us: Option<i64>,
    /// Instants (UTC micros) that appeared more than once; only the first row was kept.
    pub duplicates: Vec<i64>,
    /// Grid instants (UTC micros) absent from the input.
    pub missing: Vec<i64>,
}

/// Sorts, de-duplicates and reindexes `df` onto the complete grid of its dominant
/// sampling step.
///
/// Every non-key column is treated as numeric. A missing value whose left and right
/// neighbours are both present is filled with their midpoint, which is linear
/// interpolation on a regular grid. This covers reindexed hours and empty cells of
/// existing rows alike. Runs of two or more missing values are kept.
pub fn normalize_dst_transitions(df: &DataFrame, ts_col: &str) -> DayAheadResult<DstRepair> {
    let dtype = df
        .column(ts_col)
        .map_err(convert_err)?
        .dtype()
        .clone();

    let sorted = df
        .clone()
        .lazy()
        .sort([ts_col], SortMultipleOptions::default().with_maintain_order(true))
        .collect()
        .map_err(convert_err)?;

    let stamps = datetime_micros(&sorted, ts_col)?;
    let keep: BooleanChunked = stamps
        .iter()
        .enumerate()
        .map(|(i, ts)| i == 0 || stamps[i - 1] != *ts)
        .collect();
    let duplicates: Vec<i64> = stamps
        .iter()
        .tuple_windows()
        .filter(|(a, b)| a == b)
        .map(|(a, _)| *a)
        .dedup()
        .collect();
    let deduped = sorted.filter(&keep).map_err(convert_err)?;
    let stamps: Vec<i64> = stamps.into_iter().dedup().collect();

    let Some(step) = infer_step(&stamps) else {
        return Ok(DstRepair {
            df: deduped,
            step_us: None,
            duplicates,
            missing: Vec::new(),
        });
    };

    let (first, last) = (stamps[0], stamps[stamps.len() - 1]);
    let grid: Vec<i64> = (0..)
        .map(|i| first + i * step)
        .take_while(|ts| *ts <= last)
        .collect();
    let missing = missing_instants(&grid, &stamps);
    let off_grid = stamps.len() + missing.len() - grid.len();
    if off_grid > 0 {
        tracing::warn!(
            off_grid,
            step_us = step,
            "Dropping rows that do not fall on the inferred grid"
        );
    }

    let grid_df = DataFrame::new(vec![datetime_column(ts_col, grid, &dtype)?])
        .map_err(convert_err)?;

    let value_cols: Vec<String> = deduped
        .get_column_names()
        .iter()
        .filter(|name| name.as_str() != ts_col)
        .map(|name| name.to_string())
        .collect();

    let mut selection = vec![col(ts_col)];
    selection.extend(value_cols.iter().map(|c| fill_single_gap(c)));

    let df = grid_df
        .lazy()
        .left_join(deduped.lazy(), col(ts_col), col(ts_col))
        .sort([ts_col], SortMultipleOptions::default())
        .select(selection)
        .collect()
        .map_err(convert_err)?;

    tracing::debug!(
        rows = df.height(),
        duplicates = duplicates.len(),
        missing = missing.len(),
        "Normalized DST transitions"
    );

    Ok(DstRepair {
        df,
        step_us: Some(step),
        duplicates,
        missing,
    })
}

/// Most frequent positive distance between consecutive instants. Ties go to the
/// smaller step.
pub(crate) fn infer_step(stamps: &[i64]) -> Option<i64> {
    stamps
        .iter()
        .tuple_windows()
        .map(|(a, b)| b - a)
        .filter(|d| *d > 0)
        .counts()
        .into_iter()
        .max_by_key(|(step, count)| (*count, Reverse(*step)))
        .map(|(step, _)| step)
}

fn missing_instants(grid: &[i64], stamps: &[i64]) -> Vec<i64> {
    let mut present = stamps.iter().peekable();
    grid.iter()
        .filter(|ts| {
            while present.next_if(|p| *p < *ts).is_some() {}
            present.next_if_eq(ts).is_none()
        })
        .copied()
        .collect()
}

fn fill_single_gap(name: &str) -> Expr {
    let prev = col(name).shift(lit(1));
    let next = col(name).shift(lit(-1));
    when(
        col(name)
            .is_null()
            .and(prev.clone().is_not_null())
            .and(next.clone().is_not_null()),
    )
    .then((prev + next) / lit(2.0))
    .otherwise(col(name))
    .alias(name)
}

fn convert_err(e: polars::error::PolarsError) -> DayAheadError {
    frame_error("normalizing DST transitions", e)
}
