use polars::prelude::{Column, DataFrame, DataType, IntoColumn, NamedFrom, Series};

use crate::error::{DataError, DayAheadResult, frame_error};

/// Physical microsecond values of a datetime column. Nulls are rejected because
/// the column is the row key.
pub(crate) fn datetime_micros(df: &DataFrame, name: &str) -> DayAheadResult<Vec<i64>> {
    let column = df
        .column(name)
        .and_then(|c| c.cast(&DataType::Int64))
        .map_err(|e| frame_error("reading timestamps", e))?;
    let ca = column
        .i64()
        .map_err(|e| frame_error("reading timestamps", e))?;
    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                DataError::MissingKey {
                    column: name.to_string(),
                    row,
                }
                .into()
            })
        })
        .collect()
}

/// Physical day values of a date column.
pub(crate) fn date_days(df: &DataFrame, name: &str) -> DayAheadResult<Vec<i32>> {
    let column = df
        .column(name)
        .and_then(|c| c.cast(&DataType::Int32))
        .map_err(|e| frame_error("reading dates", e))?;
    let ca = column.i32().map_err(|e| frame_error("reading dates", e))?;
    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                DataError::MissingKey {
                    column: name.to_string(),
                    row,
                }
                .into()
            })
        })
        .collect()
}

pub(crate) fn f64_values(df: &DataFrame, name: &str) -> DayAheadResult<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .and_then(|c| c.cast(&DataType::Float64))
        .map_err(|e| frame_error("reading numeric column", e))?;
    let ca = column
        .f64()
        .map_err(|e| frame_error("reading numeric column", e))?;
    Ok(ca.into_iter().collect())
}

pub(crate) fn datetime_column(
    name: &str,
    micros: Vec<i64>,
    dtype: &DataType,
) -> DayAheadResult<Column> {
    Series::new(name.into(), micros)
        .cast(dtype)
        .map(IntoColumn::into_column)
        .map_err(|e| frame_error("building timestamp column", e))
}

pub(crate) fn date_column(name: &str, days: Vec<i32>) -> DayAheadResult<Column> {
    Series::new(name.into(), days)
        .cast(&DataType::Date)
        .map(IntoColumn::into_column)
        .map_err(|e| frame_error("building date column", e))
}

pub(crate) fn f64_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Series::new(name.into(), values).into_column()
}

pub(crate) fn require_columns(df: &DataFrame, names: &[&str], source: &str) -> DayAheadResult<()> {
    let present = df.get_column_names();
    match names
        .iter()
        .find(|name| !present.iter().any(|p| p.as_str() == **name))
    {
        Some(missing) => Err(DataError::MissingColumn {
            column: missing.to_string(),
            source_name: source.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}
