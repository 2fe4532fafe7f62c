use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use lossrate_core::forecast::ForecastCurves;

use super::AssumptionArgs;

/// Arguments for printing the curves behind a forecast
#[derive(Args)]
pub struct CurvesArgs {
    /// Loan term in years
    #[arg(long)]
    pub term: u32,

    #[command(flatten)]
    pub assumptions: AssumptionArgs,
}

/// One period of the incidence and balance curves.
#[derive(Debug, Serialize)]
struct CurvePoint {
    period: usize,
    year: usize,
    incidence: Decimal,
    opening_balance: Decimal,
    closing_balance: Decimal,
    average_balance: Decimal,
}

pub fn run_curves(args: CurvesArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let a = &args.assumptions;
    let incidence_table = a.incidence_table()?;
    let curves = ForecastCurves::build(
        &incidence_table,
        args.term,
        a.avg_interest_rate,
        a.periods_per_year,
    )?;
    Ok(serde_json::to_value(curve_points(&curves))?)
}

fn curve_points(curves: &ForecastCurves) -> Vec<CurvePoint> {
    let per_year = curves.periods_per_year as usize;
    let mut opening = curves.balance.principal;

    curves
        .incidence
        .iter()
        .zip(curves.balance.iter())
        .enumerate()
        .map(|(i, (incidence, closing))| {
            let point = CurvePoint {
                period: i + 1,
                year: i / per_year + 1,
                incidence,
                opening_balance: opening,
                closing_balance: closing,
                average_balance: (opening + closing) / Decimal::TWO,
            };
            opening = closing;
            point
        })
        .collect()
}
