use std::path::Path;

use polars::{
    frame::DataFrame,
    prelude::{BooleanChunked, IntoLazy, SortMultipleOptions, col},
};

use crate::{
    config::{CommodityKind, QuoteFormat},
    data::{
        columns::CommodityCol,
        frame::{date_column, date_days, f64_column, f64_values},
        parse,
    },
    error::{DayAheadError, DayAheadResult, frame_error},
    io::{self, DATE_FORMAT, Table, TableName},
};

/// Daily quotes of one commodity: `date`, `opening_price`, `closing_price`, keyed by
/// calendar date and sorted ascending.
#[derive(Debug, Clone)]
pub struct CommodityTable {
    kind: CommodityKind,
    df: DataFrame,
}

impl Table for CommodityTable {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl TableName for CommodityTable {
    fn base_name(&self) -> String {
        self.kind
            .clean_file_name()
            .trim_end_matches(".csv")
            .to_string()
    }
}

impl CommodityTable {
    pub fn kind(&self) -> CommodityKind {
        self.kind
    }

    /// Reads and cleans a raw quote extract.
    pub fn from_raw_csv(
        path: impl AsRef<Path>,
        kind: CommodityKind,
        format: QuoteFormat,
    ) -> DayAheadResult<Self> {
        let raw = io::read_csv_strings(path, format.separator())?;
        Self::clean(&raw, kind, format)
    }

    /// Parses a raw quote table (all columns as strings) into the uniform layout.
    ///
    /// Only the date, opening and closing columns survive. A malformed date or price
    /// fails the whole table; empty price cells become missing values.
    pub fn clean(raw: &DataFrame, kind: CommodityKind, format: QuoteFormat) -> DayAheadResult<Self> {
        let source = format!("{kind} quotes ({format})");
        crate::data::frame::require_columns(
            raw,
            &[
                format.date_column(),
                format.opening_column(),
                format.closing_column(),
            ],
            &source,
        )?;

        let column = |name: &str| raw.column(name).map_err(convert_err);
        let dates = parse::date_column(column(format.date_column())?, format.date_formats())?;
        let opening = parse::price_column(column(format.opening_column())?, format.decimal_comma())?;
        let closing = parse::price_column(column(format.closing_column())?, format.decimal_comma())?;

        let df = Self::assemble(dates, opening, closing)?;
        Self { kind, df }.sorted_unique()
    }

    /// Re-reads a cleaned checkpoint written by [`crate::io::ToCsv`].
    pub fn from_csv(path: impl AsRef<Path>, kind: CommodityKind) -> DayAheadResult<Self> {
        let raw = io::read_csv_strings(path, b',')?;
        let column = |c: CommodityCol| raw.column(c.as_str()).map_err(convert_err);
        let dates = parse::date_column(column(CommodityCol::Date)?, &[DATE_FORMAT])?;
        let opening = parse::price_column(column(CommodityCol::OpeningPrice)?, false)?;
        let closing = parse::price_column(column(CommodityCol::ClosingPrice)?, false)?;
        let df = Self::assemble(dates, opening, closing)?;
        Self { kind, df }.sorted_unique()
    }

    /// Reindexes onto every calendar day between the first and last quote and fills
    /// days without any quote from the last traded day.
    ///
    /// A filled day receives the previous trading day's **closing** price as both its
    /// opening and closing price. Days before the first quote stay missing.
    pub fn impute_non_trading_days(&self) -> DayAheadResult<Self> {
        let days = date_days(&self.df, CommodityCol::Date.as_str())?;
        let (Some(first), Some(last)) = (days.first().copied(), days.last().copied()) else {
            return Ok(self.clone());
        };

        let opening = f64_values(&self.df, CommodityCol::OpeningPrice.as_str())?;
        let closing = f64_values(&self.df, CommodityCol::ClosingPrice.as_str())?;

        let grid: Vec<i32> = (first..=last).collect();
        let mut grid_open = Vec::with_capacity(grid.len());
        let mut grid_close = Vec::with_capacity(grid.len());
        let mut quotes = days.iter().zip(opening.iter().zip(closing.iter())).peekable();
        let mut last_close: Option<Option<f64>> = None;
        let mut filled = 0usize;

        for day in &grid {
            let quote = quotes.next_if(|(d, _)| **d == *day).map(|(_, q)| q);
            match quote {
                Some((open, close)) if open.is_some() || close.is_some() => {
                    grid_open.push(*open);
                    grid_close.push(*close);
                    last_close = Some(*close);
                }
                _ => {
                    let carried = last_close.flatten();
                    if carried.is_some() {
                        filled += 1;
                    }
                    grid_open.push(carried);
                    grid_close.push(carried);
                }
            }
        }

        tracing::debug!(
            commodity = %self.kind,
            days = grid.len(),
            filled,
            "Imputed non-trading days"
        );

        let df = Self::assemble(grid, grid_open, grid_close)?;
        Ok(Self {
            kind: self.kind,
            df,
        })
    }

    fn assemble(
        days: Vec<i32>,
        opening: Vec<Option<f64>>,
        closing: Vec<Option<f64>>,
    ) -> DayAheadResult<DataFrame> {
        DataFrame::new(vec![
            date_column(CommodityCol::Date.as_str(), days)?,
            f64_column(CommodityCol::OpeningPrice.as_str(), opening),
            f64_column(CommodityCol::ClosingPrice.as_str(), closing),
        ])
        .map_err(convert_err)
    }

    /// Sorts by date and keeps the first row of a repeated date.
    fn sorted_unique(self) -> DayAheadResult<Self> {
        let sorted = self
            .df
            .lazy()
            .sort(
                [CommodityCol::Date.as_str()],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .select([
                col(CommodityCol::Date),
                col(CommodityCol::OpeningPrice),
                col(CommodityCol::ClosingPrice),
            ])
            .collect()
            .map_err(convert_err)?;

        let days = date_days(&sorted, CommodityCol::Date.as_str())?;
        let mask: Vec<bool> = days
            .iter()
            .enumerate()
            .map(|(i, d)| i == 0 || days[i - 1] != *d)
            .collect();
        let repeated = mask.iter().filter(|k| !**k).count();
        let keep: BooleanChunked = mask.into_iter().collect();
        if repeated > 0 {
            tracing::warn!(commodity = %self.kind, repeated, "Dropping repeated quote dates");
        }
        let df = sorted.filter(&keep).map_err(convert_err)?;
        Ok(Self {
            kind: self.kind,
            df,
        })
    }
}

fn convert_err(e: polars::error::PolarsError) -> DayAheadError {
    frame_error("cleaning commodity quotes", e)
}
