use chrono::NaiveDate;
use polars::{
    frame::DataFrame,
    prelude::{DataType, IntoLazy, SortMultipleOptions, col, lit},
};
use strum::IntoEnumIterator;

use crate::{
    config::{CommodityKind, MarketKind},
    data::{
        columns::{CommodityCol, DATE_KEY, LagCol, MarketCol, naive_datetime},
        commodity::CommodityTable,
        lags::LaggedMarket,
        parse,
    },
    error::{DayAheadError, DayAheadResult, frame_error},
    io::{Table, TableName},
};

/// The three imputed commodity tables, shared by every market.
#[derive(Debug, Clone)]
pub struct CommoditySet {
    pub co2: CommodityTable,
    pub oil: CommodityTable,
    pub gas: CommodityTable,
}

impl CommoditySet {
    pub fn get(&self, kind: CommodityKind) -> &CommodityTable {
        match kind {
            CommodityKind::Co2 => &self.co2,
            CommodityKind::Oil => &self.oil,
            CommodityKind::Gas => &self.gas,
        }
    }
}

/// Final model input of one market: the lagged hourly record on a naive UTC axis with
/// the same-day commodity opening prices.
#[derive(Debug, Clone)]
pub struct MergedFeatureTable {
    market: MarketKind,
    df: DataFrame,
}

impl Table for MergedFeatureTable {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }
}

impl TableName for MergedFeatureTable {
    fn base_name(&self) -> String {
        format!("{}_merged", self.market.tag())
    }
}

impl MergedFeatureTable {
    pub fn market(&self) -> MarketKind {
        self.market
    }

    /// Joins carbon, oil and gas onto the market by UTC calendar date, in that order.
    ///
    /// Only the opening price of each commodity is kept, under `<prefix>_opening_price`.
    /// Days a commodity does not cover become missing values.
    #[tracing::instrument(skip_all, fields(market = %lagged.market()))]
    pub fn merge(lagged: &LaggedMarket, commodities: &CommoditySet) -> DayAheadResult<Self> {
        let ts = MarketCol::Timestamp.as_str();

        let mut lf = lagged
            .as_df()
            .clone()
            .lazy()
            .with_column(col(ts).cast(DataType::Int64).cast(naive_datetime()).alias(ts))
            .with_column(col(ts).dt().date().alias(DATE_KEY));

        for kind in CommodityKind::iter() {
            let daily = commodities.get(kind).as_df().clone().lazy().select([
                col(CommodityCol::Date).alias(DATE_KEY),
                col(CommodityCol::OpeningPrice).alias(kind.opening_column()),
            ]);
            lf = lf.left_join(daily, col(DATE_KEY), col(DATE_KEY));
        }

        let df = lf
            .sort([ts], SortMultipleOptions::default())
            .select(output_columns().into_iter().map(col).collect::<Vec<_>>())
            .collect()
            .map_err(convert_err)?;

        tracing::info!(rows = df.height(), "Merged commodities");
        Ok(Self {
            market: lagged.market(),
            df,
        })
    }

    /// Drops every row with a missing field and every row before `cutoff`.
    pub fn retain_complete_since(&self, cutoff: NaiveDate) -> DayAheadResult<Self> {
        let cutoff_us = parse::naive_to_micros(cutoff.and_time(chrono::NaiveTime::MIN));
        let before = self.df.height();
        let df = self
            .df
            .clone()
            .lazy()
            .drop_nulls(None)
            .filter(
                col(MarketCol::Timestamp)
                    .cast(DataType::Int64)
                    .gt_eq(lit(cutoff_us)),
            )
            .collect()
            .map_err(convert_err)?;

        tracing::info!(
            market = %self.market,
            %cutoff,
            kept = df.height(),
            dropped = before - df.height(),
            "Applied completeness filter"
        );
        Ok(Self {
            market: self.market,
            df,
        })
    }
}

/// Column layout of the merged output.
pub fn output_columns() -> Vec<String> {
    let mut names: Vec<String> = [
        MarketCol::Timestamp,
        MarketCol::DayAheadPrice,
        MarketCol::LoadForecast,
        MarketCol::SolarForecast,
        MarketCol::WindAggregate,
    ]
    .iter()
    .map(|c| c.as_str().to_string())
    .collect();
    names.extend(LagCol::iter().map(|c| c.as_str().to_string()));
    names.extend(CommodityKind::iter().map(|k| k.opening_column()));
    names
}

fn convert_err(e: polars::error::PolarsError) -> DayAheadError {
    frame_error("merging commodities", e)
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;
    use crate::{
        config::QuoteFormat,
        data::{
            columns::utc_datetime,
            frame::{datetime_column, datetime_micros, f64_values},
            market::MarketSeries,
        },
    };

    const HOUR_US: i64 = 3_600_000_000;
    /// 2021-01-04 00:00:00 UTC, a Monday.
    const T0: i64 = 1_609_718_400_000_000;

    fn lagged(hours: i64) -> LaggedMarket {
        let n = hours as usize;
        let stamps: Vec<i64> = (0..hours).map(|h| T0 + h * HOUR_US).collect();
        let prices: Vec<Option<f64>> = (0..hours).map(|h| Some(h as f64)).collect();
        let mut df = df![
            "day_ahead_price" => prices,
            "load_forecast" => vec![1.0; n],
            "solar_forecast" => vec![0.0; n],
            "wind_aggregate" => vec![2.0; n]
        ]
        .expect("Failed to create DF");
        let ts = datetime_column("timestamp", stamps, &utc_datetime()).expect("valid column");
        df.insert_column(0, ts).expect("Failed to insert timestamp");
        LaggedMarket::try_from(&MarketSeries::from_frame(df, MarketKind::Germany))
            .expect("lagged")
    }

    fn quotes(kind: CommodityKind, rows: &[(&str, &str, &str)]) -> CommodityTable {
        let raw = df![
            "Datum" => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            "Erster" => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            "Schlusskurs" => rows.iter().map(|r| r.2).collect::<Vec<_>>()
        ]
        .expect("Failed to create DF");
        CommodityTable::clean(&raw, kind, QuoteFormat::European)
            .expect("clean")
            .impute_non_trading_days()
            .expect("impute")
    }

    fn commodities() -> CommoditySet {
        CommoditySet {
            co2: quotes(
                CommodityKind::Co2,
                &[("2021-01-04", "30,0", "31,0"), ("2021-01-06", "32,0", "33,0")],
            ),
            oil: quotes(
                CommodityKind::Oil,
                &[("2021-01-04", "50,0", "51,0"), ("2021-01-06", "52,0", "53,0")],
            ),
            gas: quotes(CommodityKind::Gas, &[("2021-01-05", "18,0", "19,0")]),
        }
    }

    #[test]
    fn test_merge_broadcasts_daily_opening_prices() {
        let merged = MergedFeatureTable::merge(&lagged(72), &commodities()).expect("merge");
        let df = merged.as_df();

        assert_eq!(df.height(), 72);
        assert_eq!(df.column("timestamp").unwrap().dtype(), &naive_datetime());
        assert_eq!(df.get_column_names().len(), 14);

        let co2 = f64_values(df, "co2_opening_price").unwrap();
        assert!(co2[..24].iter().all(|v| *v == Some(30.0)));
        // Tuesday is carried from Monday's close.
        assert!(co2[24..48].iter().all(|v| *v == Some(31.0)));
        assert!(co2[48..].iter().all(|v| *v == Some(32.0)));

        let gas = f64_values(df, "gas_opening_price").unwrap();
        assert!(gas[..24].iter().all(Option::is_none));
        assert!(gas[24..48].iter().all(|v| *v == Some(18.0)));
        assert!(gas[48..].iter().all(Option::is_none));
    }

    #[test]
    fn test_merge_keeps_instants_when_dropping_time_zone() {
        let lagged = lagged(30);
        let merged = MergedFeatureTable::merge(&lagged, &commodities()).expect("merge");
        assert_eq!(
            datetime_micros(merged.as_df(), "timestamp").unwrap(),
            datetime_micros(lagged.as_df(), "timestamp").unwrap()
        );
        assert_eq!(merged.filename(crate::io::FileExtension::Csv), "ger_merged.csv");
    }

    #[test]
    fn test_completeness_filter_drops_missing_rows_and_applies_cutoff() {
        let merged = MergedFeatureTable::merge(&lagged(24 * 9), &commodities()).expect("merge");

        let all = merged
            .retain_complete_since(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .expect("filter");
        // Only 2021-01-05 has gas, and its lag_7d is missing, so nothing survives.
        assert_eq!(all.as_df().height(), 0);

        let gas_every_day = CommoditySet {
            gas: quotes(
                CommodityKind::Gas,
                &[("2021-01-04", "18,0", "19,0"), ("2021-01-13", "20,0", "21,0")],
            ),
            ..commodities()
        };
        let merged = MergedFeatureTable::merge(&lagged(24 * 9), &gas_every_day).expect("merge");
        let kept = merged
            .retain_complete_since(NaiveDate::from_ymd_opt(2021, 1, 12).unwrap())
            .expect("filter");
        let df = kept.as_df();
        // co2 and oil stop on 2021-01-06; no rows are complete.
        assert_eq!(df.height(), 0);
        assert_eq!(df.get_column_names().len(), 14);
    }

    #[test]
    fn test_completeness_filter_result_has_no_nulls_and_starts_at_cutoff() {
        let rows: Vec<(String, String, String)> = (4..=13)
            .map(|d| (format!("2021-01-{d:02}"), "1,0".to_string(), "1,5".to_string()))
            .collect();
        let rows: Vec<(&str, &str, &str)> = rows
            .iter()
            .map(|(a, b, c)| (a.as_str(), b.as_str(), c.as_str()))
            .collect();
        let set = CommoditySet {
            co2: quotes(CommodityKind::Co2, &rows),
            oil: quotes(CommodityKind::Oil, &rows),
            gas: quotes(CommodityKind::Gas, &rows),
        };
        let merged = MergedFeatureTable::merge(&lagged(24 * 9), &set).expect("merge");
        let kept = merged
            .retain_complete_since(NaiveDate::from_ymd_opt(2021, 1, 12).unwrap())
            .expect("filter");
        let df = kept.as_df();

        // 2021-01-11 is the first day with a 7-day lag, the cutoff moves it to 01-12.
        assert_eq!(df.height(), 24);
        assert_eq!(
            df.get_columns().iter().map(|c| c.null_count()).sum::<usize>(),
            0
        );
        assert_eq!(
            datetime_micros(df, "timestamp").unwrap()[0],
            T0 + 8 * 24 * HOUR_US
        );
    }
}
