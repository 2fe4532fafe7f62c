use clap::Args;
use serde_json::Value;
use std::fs;
use std::path::Path;

use lossrate_core::forecast::batch::{
    extract_term_from_filename, loss_rate_filename, table_count_warning, BatchSummary,
    CurveCache, TableOutcome, DEFAULT_EXPECTED_TABLES, TABLE_SUFFIX,
};

use super::AssumptionArgs;
use crate::input;
use crate::output::csv_out::write_rate_table;

/// Arguments for forecasting a directory of bad-rate tables
#[derive(Args)]
pub struct BatchArgs {
    /// Directory of bad-rate CSV tables
    #[arg(long, default_value = "badrate_tables")]
    pub input_dir: String,

    /// Directory the loss-rate tables are written to (created if missing)
    #[arg(long, default_value = "lossrate_tables")]
    pub output_dir: String,

    /// Number of tables a complete run should find
    #[arg(long, default_value_t = DEFAULT_EXPECTED_TABLES)]
    pub expected_tables: usize,

    #[command(flatten)]
    pub assumptions: AssumptionArgs,
}

pub fn run_batch(args: BatchArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let incidence_table = args.assumptions.incidence_table()?;
    let names = input::file::list_files(&args.input_dir, TABLE_SUFFIX)?;

    let mut summary = BatchSummary {
        tables_found: names.len(),
        ..BatchSummary::default()
    };
    if let Some(warning) = table_count_warning(names.len(), args.expected_tables) {
        tracing::warn!("{}", warning);
        summary.warnings.push(warning);
    }

    fs::create_dir_all(&args.output_dir)
        .map_err(|e| format!("Failed to create '{}': {}", args.output_dir, e))?;

    let mut cache = CurveCache::new(&incidence_table);
    for name in &names {
        let outcome = match forecast_file(&mut cache, &args, name) {
            Ok(outcome) => {
                tracing::info!(file = %name, "forecast loss rates");
                outcome
            }
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "skipped bad rate table");
                TableOutcome::Failed {
                    input: name.clone(),
                    reason: e.to_string(),
                }
            }
        };
        summary.record(outcome);
    }

    tracing::info!(
        found = summary.tables_found,
        forecast = summary.tables_forecast,
        failed = summary.tables_failed,
        curve_sets = cache.len(),
        "batch complete"
    );
    Ok(serde_json::to_value(summary)?)
}

fn forecast_file(
    cache: &mut CurveCache<'_>,
    args: &BatchArgs,
    name: &str,
) -> Result<TableOutcome, Box<dyn std::error::Error>> {
    let term = extract_term_from_filename(name)
        .ok_or_else(|| format!("no term found in file name '{}'", name))?;

    let input_path = Path::new(&args.input_dir).join(name);
    let bad_rates = input::csv_table::read_rate_table(&input_path.to_string_lossy())?;

    let a = &args.assumptions;
    let loss_rates = cache.forecast(
        &bad_rates,
        term,
        a.avg_interest_rate,
        a.recovery_rate,
        a.periods_per_year,
    )?;

    let output_name = loss_rate_filename(name);
    let output_path = Path::new(&args.output_dir).join(&output_name);
    // Render in memory so a failed table leaves no partial file behind.
    let mut wtr = csv::Writer::from_writer(Vec::new());
    write_rate_table(&mut wtr, &loss_rates)?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| format!("Failed to render '{}': {}", output_name, e))?;
    fs::write(&output_path, bytes)
        .map_err(|e| format!("Failed to write '{}': {}", output_path.display(), e))?;

    Ok(TableOutcome::Forecast {
        input: name.to_string(),
        output: output_name,
        term,
        rows: loss_rates.n_rows(),
        columns: loss_rates.n_columns(),
    })
}
