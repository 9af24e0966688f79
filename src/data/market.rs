use std::path::Path;

use chrono::{DateTime, Utc};
use polars::{frame::DataFrame, prelude::Column};

use crate::{
    config::{MarketKind, MarketSchema},
    data::{
        columns::{MarketCol, utc_datetime},
        dst::{DstRepair, normalize_dst_transitions},
        frame::{datetime_column, f64_column, require_columns},
        parse,
    },
    error::{DataError, DayAheadError, DayAheadResult, frame_error},
    io::{self, Table},
};

/// Hourly market record on the UTC axis: `timestamp`, `day_ahead_price`,
/// `load_forecast`, `solar_forecast`, `wind_aggregate`.
#[derive(Debug, Clone)]
pub struct MarketSeries {
    market: MarketKind,
    df: DataFrame,
}

impl Table for MarketSeries {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl MarketSeries {
    pub fn market(&self) -> MarketKind {
        self.market
    }

    #[cfg(test)]
    pub(crate) fn from_frame(df: DataFrame, market: MarketKind) -> Self {
        Self { market, df }
    }

    pub fn from_raw_csv(path: impl AsRef<Path>, market: MarketKind) -> DayAheadResult<Self> {
        let path = path.as_ref();
        let raw = io::read_csv_strings(path, b',')?;
        let series = Self::from_raw(&raw, market)?;
        tracing::info!(
            %market,
            rows = series.df.height(),
            file = %path.display(),
            "Loaded raw market extract"
        );
        Ok(series)
    }

    /// Builds the market record from a raw extract read as strings.
    ///
    /// The first column holds the offset timestamps whatever its header. Raw columns are
    /// renamed per [`MarketSchema`] and the wind columns are combined.
    pub fn from_raw(raw: &DataFrame, market: MarketKind) -> DayAheadResult<Self> {
        let schema = market.schema();
        let source = format!("{market} extract");
        require_columns(raw, &schema.required_columns(), &source)?;

        let ts_raw = raw.get_columns().first().ok_or_else(|| DataError::MissingColumn {
            column: "timestamp".to_string(),
            source_name: source.clone(),
        })?;
        let stamps = parse::timestamp_column(ts_raw)?;

        let values = |name: &str| -> DayAheadResult<Vec<Option<f64>>> {
            parse::price_column(raw.column(name).map_err(convert_err)?, false)
        };

        let wind = aggregate_wind(&schema, |name| {
            raw.column(name).ok().map(|c| parse::price_column(c, false)).transpose()
        })?;

        let columns: Vec<Column> = vec![
            datetime_column(MarketCol::Timestamp.as_str(), stamps, &utc_datetime())?,
            f64_column(MarketCol::DayAheadPrice.as_str(), values(schema.price)?),
            f64_column(MarketCol::LoadForecast.as_str(), values(schema.load_forecast)?),
            f64_column(MarketCol::SolarForecast.as_str(), values(schema.solar_forecast)?),
            f64_column(MarketCol::WindAggregate.as_str(), wind),
        ];
        let df = DataFrame::new(columns).map_err(convert_err)?;
        Ok(Self { market, df })
    }

    /// Repairs DST duplicates and gaps, logging each event in the market's wall clock.
    pub fn normalize_dst(&self) -> DayAheadResult<Self> {
        let DstRepair {
            df,
            step_us,
            duplicates,
            missing,
        } = normalize_dst_transitions(&self.df, MarketCol::Timestamp.as_str())?;

        let tz = self.market.timezone();
        let local = |us: i64| {
            DateTime::<Utc>::from_timestamp_micros(us)
                .map(|dt| dt.with_timezone(&tz).to_string())
                .unwrap_or_else(|| us.to_string())
        };
        for us in &duplicates {
            tracing::debug!(market = %self.market, at = %local(*us), "Dropped repeated hour");
        }
        for us in &missing {
            tracing::debug!(market = %self.market, at = %local(*us), "Filled absent hour");
        }
        tracing::info!(
            market = %self.market,
            step_us,
            duplicates = duplicates.len(),
            missing = missing.len(),
            rows = df.height(),
            "Normalized market series"
        );

        Ok(Self {
            market: self.market,
            df,
        })
    }
}

/// Combines onshore and offshore forecasts. A missing side counts as zero unless both
/// sides are missing. Markets without offshore generation use onshore as is.
///
/// `lookup` returns `None` for an absent column.
pub(crate) fn aggregate_wind<F>(schema: &MarketSchema, lookup: F) -> DayAheadResult<Vec<Option<f64>>>
where
    F: Fn(&str) -> DayAheadResult<Option<Vec<Option<f64>>>>,
{
    let onshore = lookup(schema.onshore_wind)?.ok_or_else(|| DataError::MissingColumn {
        column: schema.onshore_wind.to_string(),
        source_name: "wind forecast".to_string(),
    })?;
    let offshore = match schema.offshore_wind {
        Some(name) => lookup(name)?,
        None => None,
    };
    Ok(match offshore {
        None => onshore,
        Some(offshore) => onshore
            .into_iter()
            .zip(offshore)
            .map(|(on, off)| match (on, off) {
                (None, None) => None,
                (on, off) => Some(on.unwrap_or(0.0) + off.unwrap_or(0.0)),
            })
            .collect(),
    })
}

fn convert_err(e: polars::error::PolarsError) -> DayAheadError {
    frame_error("loading market extract", e)
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;
    use crate::data::frame::{datetime_micros, f64_values};

    fn german_raw() -> DataFrame {
        df![
            "" => [
                "2021-10-31 01:00:00+02:00",
                "2021-10-31 02:00:00+02:00",
                "2021-10-31 02:00:00+01:00",
                "2021-10-31 03:00:00+01:00"
            ],
            "day_ahead_price_eur_mwh" => ["50.0", "40.0", "45.0", "42.5"],
            "Forecasted Load_mw" => ["100", "110", "105", ""],
            "Solar_mw" => ["0", "0", "0", "0"],
            "Wind Onshore_mw" => [Some("10"), None, None, Some("7.5")],
            "Wind Offshore_mw" => [Some("5"), Some("3"), None, None]
        ]
        .expect("Failed to create DF")
    }

    #[test]
    fn test_from_raw_renames_and_converts_to_utc() {
        let series = MarketSeries::from_raw(&german_raw(), MarketKind::Germany).expect("load");
        let df = series.as_df();

        assert_eq!(
            df.get_column_names(),
            [
                "timestamp",
                "day_ahead_price",
                "load_forecast",
                "solar_forecast",
                "wind_aggregate"
            ]
        );
        assert_eq!(df.column("timestamp").unwrap().dtype(), &utc_datetime());

        let stamps = datetime_micros(df, "timestamp").unwrap();
        let hour = 3_600_000_000;
        assert!(stamps.windows(2).all(|w| w[1] - w[0] == hour));
        assert_eq!(
            f64_values(df, "load_forecast").unwrap()[3],
            None,
            "empty cell is a missing value"
        );
    }

    #[test]
    fn test_wind_aggregate_treats_one_missing_side_as_zero() {
        let series = MarketSeries::from_raw(&german_raw(), MarketKind::Germany).expect("load");
        assert_eq!(
            f64_values(series.as_df(), "wind_aggregate").unwrap(),
            vec![Some(15.0), Some(3.0), None, Some(7.5)]
        );
    }

    #[test]
    fn test_spain_uses_onshore_only() {
        let mut raw = german_raw();
        let _ = raw.drop_in_place("Wind Offshore_mw").expect("column exists");
        let series = MarketSeries::from_raw(&raw, MarketKind::Spain).expect("load");
        assert_eq!(
            f64_values(series.as_df(), "wind_aggregate").unwrap(),
            vec![Some(10.0), None, None, Some(7.5)]
        );
    }

    #[test]
    fn test_missing_required_column_fails() {
        let mut raw = german_raw();
        let _ = raw.drop_in_place("Wind Offshore_mw").expect("column exists");
        let err = MarketSeries::from_raw(&raw, MarketKind::Germany).expect_err("offshore required");
        assert!(err.to_string().contains("Wind Offshore_mw"));
    }

    #[test]
    fn test_malformed_timestamp_fails() {
        let raw = df![
            "" => ["yesterday"],
            "day_ahead_price_eur_mwh" => ["1"],
            "Forecasted Load_mw" => ["1"],
            "Solar_mw" => ["1"],
            "Wind Onshore_mw" => ["1"]
        ]
        .expect("Failed to create DF");
        assert!(MarketSeries::from_raw(&raw, MarketKind::Spain).is_err());
    }

    #[test]
    fn test_normalize_dst_fills_spring_gap() {
        let raw = df![
            "" => [
                "2021-03-28 00:00:00+01:00",
                "2021-03-28 01:00:00+01:00",
                "2021-03-28 04:00:00+02:00"
            ],
            "day_ahead_price_eur_mwh" => ["10", "20", "40"],
            "Forecasted Load_mw" => ["1", "1", "1"],
            "Solar_mw" => ["0", "0", "0"],
            "Wind Onshore_mw" => ["2", "4", "8"]
        ]
        .expect("Failed to create DF");
        let series = MarketSeries::from_raw(&raw, MarketKind::Spain)
            .expect("load")
            .normalize_dst()
            .expect("normalize");

        // 01:00+01:00 is followed by 04:00+02:00, one UTC hour is absent in between.
        assert_eq!(series.as_df().height(), 4);
        assert_eq!(
            f64_values(series.as_df(), "day_ahead_price").unwrap(),
            vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0)]
        );
        assert_eq!(
            f64_values(series.as_df(), "wind_aggregate").unwrap()[2],
            Some(6.0)
        );
    }
}
