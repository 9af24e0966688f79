use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

use crate::error::{ConfigError, DayAheadResult, IoError};

// ================================================================================================
// Markets
// ================================================================================================

/// Bidding zones processed by the pipeline.
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
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Germany,
    Spain,
}

impl MarketKind {
    /// Short tag used in file names (`ger`, `es`).
    pub fn tag(&self) -> &'static str {
        match self {
            MarketKind::Germany => "ger",
            MarketKind::Spain => "es",
        }
    }

    /// Wall-clock zone the provider publishes this market in.
    pub fn timezone(&self) -> Tz {
        match self {
            MarketKind::Germany => chrono_tz::Europe::Berlin,
            MarketKind::Spain => chrono_tz::Europe::Madrid,
        }
    }

    pub fn schema(&self) -> MarketSchema {
        match self {
            MarketKind::Germany => MarketSchema {
                offshore_wind: Some(RAW_WIND_OFFSHORE),
                lag_warmup_start: None,
                ..MarketSchema::base()
            },
            MarketKind::Spain => MarketSchema {
                offshore_wind: None,
                lag_warmup_start: NaiveDate::from_ymd_opt(2015, 1, 1),
                ..MarketSchema::base()
            },
        }
    }
}

const RAW_PRICE: &str = "day_ahead_price_eur_mwh";
const RAW_LOAD: &str = "Forecasted Load_mw";
const RAW_SOLAR: &str = "Solar_mw";
const RAW_WIND_ONSHORE: &str = "Wind Onshore_mw";
const RAW_WIND_OFFSHORE: &str = "Wind Offshore_mw";

/// Raw column layout of one market's extract.
///
/// Optional fields are resolved here once so loaders and validators never branch on
/// column presence themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketSchema {
    pub price: &'static str,
    pub load_forecast: &'static str,
    pub solar_forecast: &'static str,
    pub onshore_wind: &'static str,
    /// `None` for markets without offshore generation.
    pub offshore_wind: Option<&'static str>,
    /// First day kept in the lagged checkpoint; earlier rows only feed the lags.
    pub lag_warmup_start: Option<NaiveDate>,
}

impl MarketSchema {
    fn base() -> Self {
        Self {
            price: RAW_PRICE,
            load_forecast: RAW_LOAD,
            solar_forecast: RAW_SOLAR,
            onshore_wind: RAW_WIND_ONSHORE,
            offshore_wind: None,
            lag_warmup_start: None,
        }
    }

    /// Raw columns that must be present in the extract.
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut cols = vec![
            self.price,
            self.load_forecast,
            self.solar_forecast,
            self.onshore_wind,
        ];
        cols.extend(self.offshore_wind);
        cols
    }
}

/// A market and the raw extract it is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSource {
    pub market: MarketKind,
    /// File name inside [`PipelineConfig::raw_dir`].
    pub file: String,
}

// ================================================================================================
// Commodities
// ================================================================================================

/// Daily commodity series, in merge order.
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
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommodityKind {
    /// EU carbon allowances.
    Co2,
    Oil,
    /// TTF natural gas.
    Gas,
}

impl CommodityKind {
    /// Column prefix in the merged table.
    pub fn prefix(&self) -> &'static str {
        self.into()
    }

    pub fn opening_column(&self) -> String {
        format!("{}_opening_price", self.prefix())
    }

    /// Checkpoint file name of the cleaned table.
    pub fn clean_file_name(&self) -> &'static str {
        match self {
            CommodityKind::Co2 => "co2_allowances_clean.csv",
            CommodityKind::Oil => "oil_clean.csv",
            CommodityKind::Gas => "gas_clean.csv",
        }
    }
}

/// Layout of a daily quote extract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuoteFormat {
    /// Semicolon separated, decimal comma: `Datum;Erster;Hoch;Tief;Schlusskurs;Stuecke;Volumen`.
    #[default]
    European,
    /// Comma separated, decimal point: `Date,Price,Open,High,Low,Vol.,Change %`.
    Investing,
}

impl QuoteFormat {
    pub fn separator(&self) -> u8 {
        match self {
            QuoteFormat::European => b';',
            QuoteFormat::Investing => b',',
        }
    }

    pub fn decimal_comma(&self) -> bool {
        matches!(self, QuoteFormat::European)
    }

    pub fn date_column(&self) -> &'static str {
        match self {
            QuoteFormat::European => "Datum",
            QuoteFormat::Investing => "Date",
        }
    }

    pub fn opening_column(&self) -> &'static str {
        match self {
            QuoteFormat::European => "Erster",
            QuoteFormat::Investing => "Open",
        }
    }

    pub fn closing_column(&self) -> &'static str {
        match self {
            QuoteFormat::European => "Schlusskurs",
            QuoteFormat::Investing => "Price",
        }
    }

    pub fn date_formats(&self) -> &'static [&'static str] {
        match self {
            QuoteFormat::European => &["%Y-%m-%d", "%d.%m.%Y"],
            QuoteFormat::Investing => &["%m/%d/%Y"],
        }
    }
}

/// A commodity and the extract it is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommoditySource {
    pub commodity: CommodityKind,
    /// File name inside [`PipelineConfig::raw_dir`].
    pub file: String,
    pub format: QuoteFormat,
}

// ================================================================================================
// Pipeline
// ================================================================================================

/// Everything one pipeline run needs. No stage reads process-wide state.
///
/// # Example
/// ```
/// # use dayahead::prelude::*;
/// let cfg = PipelineConfig::default()
///     .with_raw_dir("data/raw")
///     .with_processed_dir("data/processed")
///     .with_tolerance(0.05);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub markets: Vec<MarketSource>,
    pub commodities: Vec<CommoditySource>,
    /// First day of the merged output.
    pub cutoff: NaiveDate,
    /// Absolute tolerance used by the validator.
    pub tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            markets: vec![
                MarketSource {
                    market: MarketKind::Germany,
                    file: "entsoe_germany_2015_2025.csv".to_string(),
                },
                MarketSource {
                    market: MarketKind::Spain,
                    file: "entsoe_spain_2015_2025.csv".to_string(),
                },
            ],
            commodities: vec![
                CommoditySource {
                    commodity: CommodityKind::Co2,
                    file: "CO_2_allowances_2015_2025.csv".to_string(),
                    format: QuoteFormat::European,
                },
                CommoditySource {
                    commodity: CommodityKind::Oil,
                    file: "oil_2015_2025.csv".to_string(),
                    format: QuoteFormat::European,
                },
                CommoditySource {
                    commodity: CommodityKind::Gas,
                    file: "ttf_gas_2017_2025.csv".to_string(),
                    format: QuoteFormat::Investing,
                },
            ],
            cutoff: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            tolerance: 0.01,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> DayAheadResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(IoError::Io)?;
        let cfg: Self = serde_json::from_str(&raw).map_err(IoError::Json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_raw_dir(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: dir.into(),
            ..self
        }
    }

    pub fn with_processed_dir(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: dir.into(),
            ..self
        }
    }

    pub fn with_markets(self, markets: Vec<MarketSource>) -> Self {
        Self { markets, ..self }
    }

    pub fn with_commodities(self, commodities: Vec<CommoditySource>) -> Self {
        Self {
            commodities,
            ..self
        }
    }

    pub fn with_cutoff(self, cutoff: NaiveDate) -> Self {
        Self { cutoff, ..self }
    }

    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    pub fn validate(&self) -> DayAheadResult<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::InvalidTolerance(self.tolerance).into());
        }
        for kind in <CommodityKind as strum::IntoEnumIterator>::iter() {
            let count = self
                .commodities
                .iter()
                .filter(|c| c.commodity == kind)
                .count();
            match count {
                0 => return Err(ConfigError::MissingCommodity(kind.to_string()).into()),
                1 => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "commodity '{kind}' is configured {count} times"
                    ))
                    .into());
                }
            }
        }
        if self.markets.is_empty() {
            return Err(ConfigError::Invalid("no markets configured".to_string()).into());
        }
        Ok(())
    }

    pub fn commodity_source(&self, kind: CommodityKind) -> Option<&CommoditySource> {
        self.commodities.iter().find(|c| c.commodity == kind)
    }
}
