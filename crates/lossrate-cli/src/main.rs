mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::batch::BatchArgs;
use commands::curves::CurvesArgs;
use commands::forecast::ForecastArgs;

/// Loss-rate forecasting from cumulative bad-rate tables
#[derive(Parser)]
#[command(
    name = "lossrate",
    version,
    about = "Forecast loss-rate tables from cumulative bad-rate tables",
    long_about = "Converts tables of cumulative bad rates (vintage by observation age) into \
                  forecast loss rates over the loan's contractual life, using a level-payment \
                  amortization curve, a periodic default-incidence curve and a recovery \
                  assumption. All arithmetic is in 128-bit decimal."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast loss rates for a single bad-rate table
    Forecast(ForecastArgs),
    /// Show the incidence and balance curves for a term
    Curves(CurvesArgs),
    /// Forecast every bad-rate table in a directory
    Batch(BatchArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Forecast(args) => commands::forecast::run_forecast(args),
        Commands::Curves(args) => commands::curves::run_curves(args),
        Commands::Batch(args) => commands::batch::run_batch(args),
        Commands::Version => {
            println!("lossrate {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
