use clap::Args;
use serde_json::Value;

use lossrate_core::forecast::batch::extract_term_from_filename;
use lossrate_core::forecast::{
    self, LossRateForecastInput, DEFAULT_AVG_INTEREST_RATE, DEFAULT_PERIODS_PER_YEAR,
    DEFAULT_RECOVERY_RATE,
};

use super::AssumptionArgs;
use crate::input;

/// Arguments for a single-table forecast
#[derive(Args)]
pub struct ForecastArgs {
    /// Bad-rate table: a CSV grid, or a JSON forecast request (overrides the flags below)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan term in years (inferred from a CSV file name when omitted)
    #[arg(long)]
    pub term: Option<u32>,

    #[command(flatten)]
    pub assumptions: AssumptionArgs,
}

pub fn run_forecast(args: ForecastArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = build_request(&args)?;
    tracing::info!(
        term = request.term,
        rows = request.bad_rates.n_rows(),
        columns = request.bad_rates.n_columns(),
        "forecasting loss rates"
    );

    let result = forecast::forecast_loss_rates(&request)?;
    for warning in &result.warnings {
        tracing::warn!("{}", warning);
    }
    Ok(serde_json::to_value(result)?)
}

fn build_request(args: &ForecastArgs) -> Result<LossRateForecastInput, Box<dyn std::error::Error>> {
    match args.input {
        Some(ref path) if is_csv(path) => {
            let bad_rates = input::csv_table::read_rate_table(path)?;
            let term = match args.term {
                Some(term) => term,
                None => term_from_path(path).ok_or_else(|| {
                    format!("--term required: no term found in file name '{}'", path)
                })?,
            };
            let a = &args.assumptions;
            Ok(LossRateForecastInput {
                bad_rates,
                term,
                avg_interest_rate: a.avg_interest_rate,
                recovery_rate: a.recovery_rate,
                periods_per_year: a.periods_per_year,
                incidence: a.incidence.as_ref().map(|_| a.incidence_table()).transpose()?,
            })
        }
        Some(ref path) => {
            warn_ignored_flags(args);
            input::file::read_json(path)
        }
        None => {
            let request = input::stdin::read_stdin_json()?
                .ok_or("--input <file.csv|file.json> or stdin required")?;
            warn_ignored_flags(args);
            Ok(request)
        }
    }
}

/// A JSON request carries its own term and assumptions.
fn warn_ignored_flags(args: &ForecastArgs) {
    let ignored = ignored_flags(args);
    if !ignored.is_empty() {
        tracing::warn!(
            flags = %ignored.join(", "),
            "JSON request overrides command-line assumptions; flags ignored"
        );
    }
}

fn ignored_flags(args: &ForecastArgs) -> Vec<&'static str> {
    let a = &args.assumptions;
    let mut flags = Vec::new();
    if args.term.is_some() {
        flags.push("--term");
    }
    if a.avg_interest_rate != DEFAULT_AVG_INTEREST_RATE {
        flags.push("--avg-interest-rate");
    }
    if a.recovery_rate != DEFAULT_RECOVERY_RATE {
        flags.push("--recovery-rate");
    }
    if a.periods_per_year != DEFAULT_PERIODS_PER_YEAR {
        flags.push("--periods-per-year");
    }
    if a.incidence.is_some() {
        flags.push("--incidence");
    }
    flags
}

fn is_csv(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".csv")
}

fn term_from_path(path: &str) -> Option<u32> {
    let name = std::path::Path::new(path).file_name()?.to_str()?;
    extract_term_from_filename(name)
}
