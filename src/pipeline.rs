//! Runs the full preparation for every configured market.
//!
//! Commodities are cleaned once and shared. Each market is then loaded, repaired,
//! lagged, merged, filtered and validated. Intermediate tables are written to the
//! processed directory and read back before the merge, so a rerun can start from the
//! checkpoints.

use std::path::PathBuf;

use crate::{
    config::{CommodityKind, MarketSource, PipelineConfig},
    data::{
        commodity::CommodityTable,
        lags::LaggedMarket,
        market::MarketSeries,
        merge::{CommoditySet, MergedFeatureTable},
    },
    error::{ConfigError, DayAheadResult},
    io::{Table, ToCsv},
    report::validation::ValidationReport,
};

/// Outcome of one market's run.
#[derive(Debug, Clone)]
pub struct MarketRun {
    pub lagged_path: PathBuf,
    pub merged_path: PathBuf,
    pub merged: MergedFeatureTable,
    pub report: ValidationReport,
}

/// Prepares every configured market. Validation mismatches are logged and returned,
/// never raised.
#[tracing::instrument(
    skip_all,
    fields(raw_dir = %cfg.raw_dir.display(), processed_dir = %cfg.processed_dir.display())
)]
pub fn run(cfg: &PipelineConfig) -> DayAheadResult<Vec<MarketRun>> {
    cfg.validate()?;
    let commodities = prepare_commodities(cfg)?;

    let runs = cfg
        .markets
        .iter()
        .map(|source| prepare_market(cfg, source, &commodities))
        .collect::<DayAheadResult<Vec<_>>>()?;

    let mismatching = runs.iter().filter(|r| !r.report.all_ok()).count();
    tracing::info!(markets = runs.len(), mismatching, "Pipeline finished");
    Ok(runs)
}

/// Cleans and imputes every commodity, writes the cleaned checkpoints and reads them
/// back.
#[tracing::instrument(skip_all)]
pub fn prepare_commodities(cfg: &PipelineConfig) -> DayAheadResult<CommoditySet> {
    Ok(CommoditySet {
        co2: prepare_commodity(cfg, CommodityKind::Co2)?,
        oil: prepare_commodity(cfg, CommodityKind::Oil)?,
        gas: prepare_commodity(cfg, CommodityKind::Gas)?,
    })
}

fn prepare_commodity(cfg: &PipelineConfig, kind: CommodityKind) -> DayAheadResult<CommodityTable> {
    let source = cfg
        .commodity_source(kind)
        .ok_or_else(|| ConfigError::MissingCommodity(kind.to_string()))?;
    let cleaned = CommodityTable::from_raw_csv(cfg.raw_dir.join(&source.file), kind, source.format)?
        .impute_non_trading_days()?;
    let path = cleaned.to_csv(&cfg.processed_dir)?;
    tracing::info!(
        commodity = %kind,
        rows = cleaned.as_df().height(),
        path = %path.display(),
        "Wrote cleaned commodity"
    );
    CommodityTable::from_csv(&path, kind)
}

#[tracing::instrument(skip(cfg, commodities), fields(market = %source.market))]
fn prepare_market(
    cfg: &PipelineConfig,
    source: &MarketSource,
    commodities: &CommoditySet,
) -> DayAheadResult<MarketRun> {
    let raw_path = cfg.raw_dir.join(&source.file);

    let series = MarketSeries::from_raw_csv(&raw_path, source.market)?.normalize_dst()?;
    let lagged = LaggedMarket::try_from(&series)?;
    let lagged_path = lagged.to_csv(&cfg.processed_dir)?;
    let lagged = LaggedMarket::from_csv(&lagged_path, source.market)?;

    let merged =
        MergedFeatureTable::merge(&lagged, commodities)?.retain_complete_since(cfg.cutoff)?;
    let merged_path = merged.to_csv(&cfg.processed_dir)?;

    let report = ValidationReport::from_raw_csv(&raw_path, &merged, cfg.tolerance)?;
    tracing::info!("\n{report}");

    Ok(MarketRun {
        lagged_path,
        merged_path,
        merged,
        report,
    })
}
