use std::{env, fs, path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use dayahead::prelude::*;
use time::macros::format_description;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Usage: `cargo run --example prepare_features [config.json]`
fn main() -> Result<()> {
    let _guard = init_tracing()?;

    let cfg = match env::args().nth(1) {
        Some(path) => PipelineConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => PipelineConfig::default(),
    };

    println!("Preparing features for {} market(s)...", cfg.markets.len());
    let start = Instant::now();
    let runs = run(&cfg)?;
    let elapsed = start.elapsed();

    for market_run in &runs {
        println!("{}", market_run.report);
        println!("Merged table: {}", market_run.merged_path.display());
    }
    println!("Finished in {elapsed:?}");

    if runs.iter().any(|r| !r.report.all_ok()) {
        println!("At least one market has validation mismatches, see the report above.");
    }

    drop(_guard);
    Ok(())
}

// ================================================================================================
// Tracing Configuration
// ================================================================================================

fn init_tracing() -> Result<Option<WorkerGuard>> {
    let app_name = "dayahead";

    let in_container =
        env::var("CONTAINER").is_ok() || std::path::Path::new("/.dockerenv").exists();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if in_container {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!("Logging to stdout (container mode)");
        Ok(None)
    } else {
        let log_dir = dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
            .map(|p| p.join(app_name).join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));
        fs::create_dir_all(&log_dir)?;

        let timestamp = time::OffsetDateTime::now_utc()
            .format(&format_description!(
                "[year][month][day]-[hour][minute][second]"
            ))
            .context("Failed to format timestamp")?;
        let file_name = format!("{app_name}-{timestamp}.log");
        let file_path = log_dir.join(&file_name);

        let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!(log_file = %file_path.display(), "Logging to file (local mode)");
        Ok(Some(guard))
    }
}
