pub mod batch;
pub mod curves;
pub mod forecast;

use clap::Args;
use rust_decimal::Decimal;

use lossrate_core::curves::AnnualIncidenceTable;

use crate::input;

/// Portfolio assumptions shared by every forecasting command.
#[derive(Args, Debug, Clone)]
pub struct AssumptionArgs {
    /// Average annual interest rate (0.14 = 14%)
    #[arg(long, default_value = "0.14")]
    pub avg_interest_rate: Decimal,

    /// Share of defaulted principal recovered, in [0, 1]
    #[arg(long, default_value = "0.10")]
    pub recovery_rate: Decimal,

    /// Payments per year (24 = semi-monthly)
    #[arg(long, default_value_t = 24)]
    pub periods_per_year: u32,

    /// JSON file of annual incidence curves keyed by term, replacing the reference table
    #[arg(long)]
    pub incidence: Option<String>,
}

impl AssumptionArgs {
    /// The injected incidence table, or the reference table.
    pub fn incidence_table(&self) -> Result<AnnualIncidenceTable, Box<dyn std::error::Error>> {
        match self.incidence {
            Some(ref path) => {
                let table: AnnualIncidenceTable = input::file::read_json(path)?;
                tracing::info!(
                    path = %path,
                    terms = ?table.terms().collect::<Vec<_>>(),
                    "loaded annual incidence table"
                );
                Ok(table)
            }
            None => Ok(AnnualIncidenceTable::reference()),
        }
    }
}
