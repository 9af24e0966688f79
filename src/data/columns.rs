use polars::prelude::{DataType, PlSmallStr, TimeUnit, TimeZone};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// Internal join key holding the calendar date of an hourly timestamp.
pub(crate) const DATE_KEY: &str = "__date";

/// Microseconds per calendar day on a UTC axis.
pub(crate) const DAY_US: i64 = 86_400_000_000;

/// Columns of an hourly market record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
    EnumCount,
)]
#[strum(serialize_all = "snake_case")]
pub enum MarketCol {
    /// Delivery hour. UTC-aware until the merge, naive UTC afterwards.
    Timestamp,
    /// Day-ahead clearing price in EUR/MWh.
    DayAheadPrice,
    /// Forecasted load in MW.
    LoadForecast,
    /// Forecasted solar generation in MW.
    SolarForecast,
    /// Forecasted wind generation in MW (onshore plus offshore where the market has it).
    WindAggregate,
}

/// Backward-looking price features added by the lag builder.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
    EnumCount,
)]
pub enum LagCol {
    /// Same hour, one day earlier.
    #[strum(serialize = "lag_1d")]
    Lag1d,
    /// Same hour, two days earlier.
    #[strum(serialize = "lag_2d")]
    Lag2d,
    /// Same hour, one week earlier.
    #[strum(serialize = "lag_7d")]
    Lag7d,
    /// Price of the last hour of the previous day.
    #[strum(serialize = "lag_prev_day_last_hour")]
    PrevDayLastHour,
    /// Minimum price of the previous calendar day.
    #[strum(serialize = "lag_prev_day_min")]
    PrevDayMin,
    /// Maximum price of the previous calendar day.
    #[strum(serialize = "lag_prev_day_max")]
    PrevDayMax,
}

impl LagCol {
    /// Day offset of the same-hour lags, `None` for the previous-day aggregates.
    pub fn day_offset(&self) -> Option<i64> {
        match self {
            LagCol::Lag1d => Some(1),
            LagCol::Lag2d => Some(2),
            LagCol::Lag7d => Some(7),
            LagCol::PrevDayLastHour | LagCol::PrevDayMin | LagCol::PrevDayMax => None,
        }
    }
}

/// Columns of a daily commodity table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
    EnumCount,
)]
#[strum(serialize_all = "snake_case")]
pub enum CommodityCol {
    Date,
    OpeningPrice,
    ClosingPrice,
}

macro_rules! impl_col_names {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PlSmallStr {
                fn from(value: $ty) -> Self {
                    value.as_str().into()
                }
            }

            impl $ty {
                pub fn name(&self) -> PlSmallStr {
                    (*self).into()
                }

                pub fn as_str(&self) -> &'static str {
                    self.into()
                }
            }
        )*
    };
}

impl_col_names!(MarketCol, LagCol, CommodityCol);

pub(crate) fn utc_datetime() -> DataType {
    DataType::Datetime(TimeUnit::Microseconds, Some(TimeZone::UTC))
}

pub(crate) fn naive_datetime() -> DataType {
    DataType::Datetime(TimeUnit::Microseconds, None)
}
