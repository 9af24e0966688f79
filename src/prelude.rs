// 1. Traits
pub use crate::io::{Table, TableName, ToCsv};

// 2. Tables
pub use crate::data::{
    commodity::CommodityTable,
    dst::{DstRepair, normalize_dst_transitions},
    lags::{LaggedMarket, add_lag_features},
    market::MarketSeries,
    merge::{CommoditySet, MergedFeatureTable},
};

// 3. Columns
pub use crate::data::columns::{CommodityCol, LagCol, MarketCol};

// 4. Configuration
pub use crate::config::{
    CommodityKind, CommoditySource, MarketKind, MarketSchema, MarketSource, PipelineConfig,
    QuoteFormat,
};

// 5. Validation
pub use crate::report::validation::{FieldCheck, FieldStatus, Offender, ValidationReport};

// 6. Errors
pub use crate::error::{ConfigError, DataError, DayAheadError, DayAheadResult, IoError};

// 7. Entry points
pub use crate::pipeline::{MarketRun, run};
