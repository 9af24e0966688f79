use std::path::Path;

use polars::{
    frame::DataFrame,
    prelude::{
        DataType, Expr, FillNullStrategy, IntoLazy, LazyFrame, Null, SortMultipleOptions, col,
        lit, when,
    },
};
use strum::IntoEnumIterator;

use crate::{
    config::MarketKind,
    data::{
        columns::{DATE_KEY, DAY_US, LagCol, MarketCol, utc_datetime},
        frame::{datetime_column, f64_column},
        market::MarketSeries,
        parse,
    },
    error::{DayAheadError, DayAheadResult, frame_error},
    io::{self, Table, TableName},
};

/// Internal join key: timestamp as physical microseconds.
const TS_KEY: &str = "__ts_us";

/// Hourly market record extended with the backward-looking price features of
/// [`LagCol`].
#[derive(Debug, Clone)]
pub struct LaggedMarket {
    market: MarketKind,
    df: DataFrame,
}

impl Table for LaggedMarket {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl TableName for LaggedMarket {
    fn base_name(&self) -> String {
        format!("data_{}_lagged", self.market.tag())
    }
}

impl TryFrom<&MarketSeries> for LaggedMarket {
    type Error = DayAheadError;

    fn try_from(series: &MarketSeries) -> Result<Self, Self::Error> {
        let df = add_lag_features(series.as_df())?;
        Self {
            market: series.market(),
            df,
        }
        .truncate_warmup()
    }
}

impl LaggedMarket {
    pub fn market(&self) -> MarketKind {
        self.market
    }

    /// Re-reads a lagged checkpoint written by [`crate::io::ToCsv`]. Timestamps in the
    /// file are UTC wall time.
    pub fn from_csv(path: impl AsRef<Path>, market: MarketKind) -> DayAheadResult<Self> {
        let raw = io::read_csv_strings(path, b',')?;
        let ts = raw.column(MarketCol::Timestamp.as_str()).map_err(convert_err)?;
        let mut columns = vec![datetime_column(
            MarketCol::Timestamp.as_str(),
            parse::timestamp_column(ts)?,
            &utc_datetime(),
        )?];
        for name in value_columns() {
            let values = parse::price_column(raw.column(name).map_err(convert_err)?, false)?;
            columns.push(f64_column(name, values));
        }
        let df = DataFrame::new(columns).map_err(convert_err)?;
        Ok(Self { market, df })
    }

    /// Drops the rows before the market's warm-up start. Those rows only exist to feed
    /// the lags of the first kept day.
    fn truncate_warmup(self) -> DayAheadResult<Self> {
        let Some(start) = self.market.schema().lag_warmup_start else {
            return Ok(self);
        };
        let start_us = parse::naive_to_micros(start.and_time(chrono::NaiveTime::MIN));
        let before = self.df.height();
        let df = self
            .df
            .lazy()
            .filter(col(MarketCol::Timestamp).cast(DataType::Int64).gt_eq(lit(start_us)))
            .collect()
            .map_err(convert_err)?;
        tracing::debug!(
            market = %self.market,
            %start,
            dropped = before - df.height(),
            "Truncated lag warm-up"
        );
        Ok(Self {
            market: self.market,
            df,
        })
    }
}

/// Column order of a lagged table after the timestamp.
fn value_columns() -> Vec<&'static str> {
    let mut names = vec![
        MarketCol::DayAheadPrice.as_str(),
        MarketCol::LoadForecast.as_str(),
        MarketCol::SolarForecast.as_str(),
        MarketCol::WindAggregate.as_str(),
    ];
    names.extend(LagCol::iter().map(|c| c.as_str()));
    names
}

/// Adds every [`LagCol`] feature to an hourly market record.
///
/// Same-hour lags join on `timestamp - k days`, so holes in the series yield missing
/// lags instead of values from the wrong hour. Daily aggregates use UTC calendar days.
/// The price column itself is left untouched.
pub fn add_lag_features(df: &DataFrame) -> DayAheadResult<DataFrame> {
    let ts = MarketCol::Timestamp.as_str();
    let price = MarketCol::DayAheadPrice.as_str();

    let base = df
        .clone()
        .lazy()
        .sort([ts], SortMultipleOptions::default())
        .with_column(col(ts).cast(DataType::Int64).alias(TS_KEY));

    let mut lf = base
        .clone()
        .with_column(prev_day_last_hour_expr().alias(LagCol::PrevDayLastHour));

    for lag in LagCol::iter() {
        if let Some(days) = lag.day_offset() {
            lf = lf.left_join(same_hour_lag(&base, lag, days), col(TS_KEY), col(TS_KEY));
        }
    }

    let daily = base
        .clone()
        .with_column(col(ts).dt().date().alias(DATE_KEY))
        .group_by([col(DATE_KEY)])
        .agg([
            col(price).min().alias(LagCol::PrevDayMin),
            col(price).max().alias(LagCol::PrevDayMax),
        ])
        .with_column(next_day(col(DATE_KEY)).alias(DATE_KEY));

    let mut selection = vec![col(ts)];
    selection.extend(value_columns().into_iter().map(col));

    lf.with_column(col(ts).dt().date().alias(DATE_KEY))
        .left_join(daily, col(DATE_KEY), col(DATE_KEY))
        .sort([ts], SortMultipleOptions::default())
        .select(selection)
        .collect()
        .map_err(convert_err)
}

fn same_hour_lag(base: &LazyFrame, lag: LagCol, days: i64) -> LazyFrame {
    base.clone().select([
        (col(TS_KEY) + lit(days * DAY_US)).alias(TS_KEY),
        col(MarketCol::DayAheadPrice).alias(lag),
    ])
}

/// Price one row before each midnight, carried over the day it opens.
fn prev_day_last_hour_expr() -> Expr {
    let price = col(MarketCol::DayAheadPrice);
    when(col(MarketCol::Timestamp).dt().hour().eq(lit(0)))
        .then(price.shift(lit(1)))
        .otherwise(lit(Null {}))
        .fill_null_with_strategy(FillNullStrategy::Forward(None))
}

fn next_day(date: Expr) -> Expr {
    (date.cast(DataType::Int32) + lit(1)).cast(DataType::Date)
}

fn convert_err(e: polars::error::PolarsError) -> DayAheadError {
    frame_error("building lag features", e)
}
