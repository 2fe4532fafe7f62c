//! Loss-rate forecast from a cumulative bad-rate table.
//!
//! Each unit of "badness" is spread over the loan's life by the periodic
//! incidence curve. A default in period `p` exposes the average of the
//! balances just before and just after `p`; the unrecovered share of that
//! exposure is the loss. Summing over all periods gives the cell's loss rate:
//!
//! ```text
//! loss = sum_p  (B[p-1] + B[p]) / 2  *  b * I[p]  *  (1 - recovery)
//! ```
//!
//! with `B[0] = 1`. The two curves depend only on term, rate and payment
//! frequency, so they are built once per table and shared by every cell.

use std::collections::HashMap;
use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::curves::{balance_curve, AnnualIncidenceTable, BalanceCurve, IncidenceCurve};
use crate::error::LossRateError;
use crate::forecast::table::RateTable;
use crate::types::{with_metadata, ComputationOutput, Fraction, Money, Rate};
use crate::LossRateResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Average annual interest rate of the reference portfolio.
pub const DEFAULT_AVG_INTEREST_RATE: Rate = dec!(0.14);

/// Share of defaulted principal recovered in the reference portfolio.
pub const DEFAULT_RECOVERY_RATE: Rate = dec!(0.10);

/// Semi-monthly payments.
pub const DEFAULT_PERIODS_PER_YEAR: u32 = 24;

// ---------------------------------------------------------------------------
// Curves
// ---------------------------------------------------------------------------

/// Balance and incidence curves for one (term, frequency, rate) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCurves {
    pub term: u32,
    pub periods_per_year: u32,
    pub avg_interest_rate: Rate,
    pub balance: BalanceCurve,
    pub incidence: IncidenceCurve,
}

impl ForecastCurves {
    /// Build both curves on a unit principal.
    pub fn build(
        incidence_table: &AnnualIncidenceTable,
        term: u32,
        avg_interest_rate: Rate,
        periods_per_year: u32,
    ) -> LossRateResult<Self> {
        validate_curve_params(avg_interest_rate, periods_per_year)?;

        // Resolve the term first so an unregistered term is reported as a
        // configuration error rather than as a period-count problem.
        incidence_table.annual(term)?;

        let total_periods =
            term.checked_mul(periods_per_year)
                .ok_or_else(|| LossRateError::InvalidInput {
                    field: "periods_per_year".into(),
                    reason: format!(
                        "term {term} x {periods_per_year} periods per year overflows"
                    ),
                })?;

        let periodic_rate = avg_interest_rate / Decimal::from(periods_per_year);
        let balance = balance_curve(periodic_rate, total_periods, Decimal::ONE)?;
        let incidence = incidence_table.periodic_incidence(term, periods_per_year)?;

        Ok(Self {
            term,
            periods_per_year,
            avg_interest_rate,
            balance,
            incidence,
        })
    }

    pub fn total_periods(&self) -> usize {
        self.balance.len()
    }

    pub fn periodic_rate(&self) -> Rate {
        self.avg_interest_rate / Decimal::from(self.periods_per_year)
    }
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Forecast loss rates with the reference annual incidence table.
pub fn forecast(
    bad_rates: &RateTable,
    term: u32,
    avg_interest_rate: Rate,
    recovery_rate: Rate,
    periods_per_year: u32,
) -> LossRateResult<RateTable> {
    forecast_with_incidence(
        &AnnualIncidenceTable::reference(),
        bad_rates,
        term,
        avg_interest_rate,
        recovery_rate,
        periods_per_year,
    )
}

/// Forecast loss rates with an injected annual incidence table.
pub fn forecast_with_incidence(
    incidence_table: &AnnualIncidenceTable,
    bad_rates: &RateTable,
    term: u32,
    avg_interest_rate: Rate,
    recovery_rate: Rate,
    periods_per_year: u32,
) -> LossRateResult<RateTable> {
    let curves = ForecastCurves::build(incidence_table, term, avg_interest_rate, periods_per_year)?;
    forecast_with_curves(bad_rates, &curves, recovery_rate)
}

/// Apply prebuilt curves to every cell of `bad_rates`.
///
/// Cells are aggregated column by column and then copied into a table with
/// the input's row and column order.
pub fn forecast_with_curves(
    bad_rates: &RateTable,
    curves: &ForecastCurves,
    recovery_rate: Rate,
) -> LossRateResult<RateTable> {
    validate_recovery_rate(recovery_rate)?;
    bad_rates.validate()?;

    let mut columns: HashMap<String, HashMap<String, Option<Fraction>>> =
        HashMap::with_capacity(bad_rates.n_columns());

    for (c, column_label) in bad_rates.column_labels.iter().enumerate() {
        let rows = bad_rates
            .row_labels
            .iter()
            .zip(bad_rates.column(c))
            .map(|(row_label, bad_rate)| {
                let loss = bad_rate.map(|b| cell_loss_rate(b, curves, recovery_rate));
                (row_label.clone(), loss)
            })
            .collect();
        columns.insert(column_label.clone(), rows);
    }

    tracing::debug!(
        rows = bad_rates.n_rows(),
        columns = bad_rates.n_columns(),
        term = curves.term,
        periods = curves.total_periods(),
        "forecast loss rate table"
    );

    Ok(bad_rates.reindex_like(&columns))
}

/// Loss rate for a single cumulative bad rate.
pub fn cell_loss_rate(
    bad_rate: Fraction,
    curves: &ForecastCurves,
    recovery_rate: Rate,
) -> Fraction {
    let loss_given_default = Decimal::ONE - recovery_rate;

    let (_, bad_sum) = curves
        .balance
        .iter()
        .zip(curves.incidence.iter())
        .fold(
            (curves.balance.principal, Decimal::ZERO),
            |(previous_balance, bad_sum): (Money, Fraction), (current_balance, incidence)| {
                let periodic_bad_rate = bad_rate * incidence;
                let average_balance = (previous_balance + current_balance) / dec!(2);
                (
                    current_balance,
                    bad_sum + average_balance * periodic_bad_rate * loss_given_default,
                )
            },
        );

    bad_sum
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

fn default_avg_interest_rate() -> Rate {
    DEFAULT_AVG_INTEREST_RATE
}

fn default_recovery_rate() -> Rate {
    DEFAULT_RECOVERY_RATE
}

fn default_periods_per_year() -> u32 {
    DEFAULT_PERIODS_PER_YEAR
}

/// Input for a loss-rate forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossRateForecastInput {
    /// Cumulative bad rates, vintages by observation age.
    pub bad_rates: RateTable,
    /// Loan term in years; must be registered in the incidence table.
    pub term: u32,
    #[serde(default = "default_avg_interest_rate")]
    pub avg_interest_rate: Rate,
    #[serde(default = "default_recovery_rate")]
    pub recovery_rate: Rate,
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: u32,
    /// Replaces the reference annual incidence table when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incidence: Option<AnnualIncidenceTable>,
}

impl LossRateForecastInput {
    /// Input with reference defaults for everything but the table and term.
    pub fn new(bad_rates: RateTable, term: u32) -> Self {
        Self {
            bad_rates,
            term,
            avg_interest_rate: DEFAULT_AVG_INTEREST_RATE,
            recovery_rate: DEFAULT_RECOVERY_RATE,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            incidence: None,
        }
    }
}

/// Output of a loss-rate forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossRateForecastOutput {
    /// Forecast loss rates, same labels and order as the input.
    pub loss_rates: RateTable,
    pub total_periods: usize,
    pub periodic_rate: Rate,
    /// Level payment per period on a unit principal.
    pub level_payment: Money,
}

#[derive(Debug, Serialize)]
struct ForecastAssumptions<'a> {
    term: u32,
    avg_interest_rate: Rate,
    recovery_rate: Rate,
    periods_per_year: u32,
    annual_incidence: &'a [Fraction],
}

/// Run a forecast and wrap it with methodology, assumptions and data-quality
/// warnings.
pub fn forecast_loss_rates(
    input: &LossRateForecastInput,
) -> LossRateResult<ComputationOutput<LossRateForecastOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let reference = AnnualIncidenceTable::reference();
    let incidence_table = input.incidence.as_ref().unwrap_or(&reference);

    if input.bad_rates.n_columns() == 0 || input.bad_rates.n_rows() == 0 {
        return Err(LossRateError::InsufficientData(
            "Bad rate table has no rows or no columns.".into(),
        ));
    }

    let curves = ForecastCurves::build(
        incidence_table,
        input.term,
        input.avg_interest_rate,
        input.periods_per_year,
    )?;

    let missing = input.bad_rates.missing_cells();
    if missing > 0 {
        warnings.push(format!(
            "{missing} bad rate cell(s) are missing or non-numeric; their loss rates are left empty."
        ));
    }
    let out_of_range = input.bad_rates.out_of_unit_range();
    if out_of_range > 0 {
        warnings.push(format!(
            "{out_of_range} bad rate cell(s) lie outside [0, 1]; values are used unclamped."
        ));
    }
    if let Some((_, sum)) = incidence_table
        .unnormalized_terms()
        .into_iter()
        .find(|(term, _)| *term == input.term)
    {
        warnings.push(format!(
            "Annual incidence for term {} sums to {sum}, not 1; loss rates scale accordingly.",
            input.term
        ));
    }

    let loss_rates = forecast_with_curves(&input.bad_rates, &curves, input.recovery_rate)?;

    let output = LossRateForecastOutput {
        loss_rates,
        total_periods: curves.total_periods(),
        periodic_rate: curves.periodic_rate(),
        level_payment: curves.balance.payment,
    };

    let assumptions = ForecastAssumptions {
        term: input.term,
        avg_interest_rate: input.avg_interest_rate,
        recovery_rate: input.recovery_rate,
        periods_per_year: input.periods_per_year,
        annual_incidence: incidence_table.annual(input.term)?,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Incidence-weighted average-balance loss forecast on a level-payment amortization curve",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_recovery_rate(recovery_rate: Rate) -> LossRateResult<()> {
    if recovery_rate < Decimal::ZERO || recovery_rate > Decimal::ONE {
        return Err(LossRateError::InvalidInput {
            field: "recovery_rate".into(),
            reason: format!("Recovery rate must be in [0, 1], got {recovery_rate}."),
        });
    }
    Ok(())
}

fn validate_curve_params(avg_interest_rate: Rate, periods_per_year: u32) -> LossRateResult<()> {
    if avg_interest_rate < Decimal::ZERO {
        return Err(LossRateError::InvalidInput {
            field: "avg_interest_rate".into(),
            reason: format!("Average interest rate cannot be negative, got {avg_interest_rate}."),
        });
    }
    if periods_per_year == 0 {
        return Err(LossRateError::InvalidInput {
            field: "periods_per_year".into(),
            reason: "Periods per year must be > 0, got 0.".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    fn labels(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn single_cell(b: Decimal) -> RateTable {
        RateTable::new(labels(&["2015-01"]), labels(&["12"]), vec![vec![Some(b)]]).unwrap()
    }

    fn vintage_table() -> RateTable {
        RateTable::new(
            labels(&["2015-03", "2015-01", "2015-02"]),
            labels(&["18", "6", "12"]),
            vec![
                vec![Some(dec!(0.09)), Some(dec!(0.02)), Some(dec!(0.05))],
                vec![Some(dec!(0.10)), Some(dec!(0.03)), Some(dec!(0.06))],
                vec![Some(dec!(0.11)), None, Some(dec!(0.07))],
            ],
        )
        .unwrap()
        .with_index_name("vintage")
    }

    #[test]
    fn test_single_period_scenario() {
        let out = forecast(&single_cell(dec!(0.05)), 1, dec!(0.14), dec!(0.1), 1).unwrap();
        // incidence [1.0], balance [0.0], average balance 0.5
        // loss = 0.5 * 0.05 * 1.0 * 0.9 = 0.0225
        assert_eq!(out.get(0, 0), Some(dec!(0.0225)));
    }

    #[test]
    fn test_interest_rate_irrelevant_for_single_period() {
        let a = forecast(&single_cell(dec!(0.05)), 1, Decimal::ZERO, dec!(0.1), 1).unwrap();
        let b = forecast(&single_cell(dec!(0.05)), 1, dec!(0.30), dec!(0.1), 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_rate_two_periods_by_hand() {
        // Balances [0.5, 0]; incidence [0.5, 0.5]
        // loss = b * 0.9 * (0.75 * 0.5 + 0.25 * 0.5) = b * 0.45
        let out = forecast(&single_cell(dec!(0.2)), 1, Decimal::ZERO, dec!(0.1), 2).unwrap();
        assert_eq!(out.get(0, 0), Some(dec!(0.09)));
    }

    #[test]
    fn test_reference_defaults_three_year() {
        let out = forecast(
            &single_cell(dec!(0.10)),
            3,
            DEFAULT_AVG_INTEREST_RATE,
            DEFAULT_RECOVERY_RATE,
            DEFAULT_PERIODS_PER_YEAR,
        )
        .unwrap();
        let loss = out.get(0, 0).unwrap();
        // Back-loaded incidence on a declining balance loses well under half
        // of the bad principal.
        assert!(loss > dec!(0.02) && loss < dec!(0.05), "loss = {loss}");
    }

    #[test]
    fn test_preserves_labels_and_order() {
        let input = vintage_table();
        let out = forecast(&input, 2, dec!(0.14), dec!(0.1), 24).unwrap();
        assert_eq!(out.row_labels, input.row_labels);
        assert_eq!(out.column_labels, input.column_labels);
        assert_eq!(out.index_name, "vintage");
    }

    #[test]
    fn test_cells_line_up_with_inputs() {
        let input = vintage_table();
        let out = forecast(&input, 2, dec!(0.14), dec!(0.1), 24).unwrap();
        let curves =
            ForecastCurves::build(&AnnualIncidenceTable::reference(), 2, dec!(0.14), 24).unwrap();
        for (r, row) in input.cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let expected = cell.map(|b| cell_loss_rate(b, &curves, dec!(0.1)));
                assert_eq!(out.get(r, c), expected);
            }
        }
    }

    #[test]
    fn test_missing_cell_stays_missing() {
        let out = forecast(&vintage_table(), 2, dec!(0.14), dec!(0.1), 24).unwrap();
        assert_eq!(out.value("2015-02", "6"), None);
        assert!(out.value("2015-02", "12").is_some());
    }

    #[test]
    fn test_loss_linear_in_bad_rate() {
        let curves =
            ForecastCurves::build(&AnnualIncidenceTable::reference(), 3, dec!(0.14), 24).unwrap();
        let one = cell_loss_rate(dec!(0.05), &curves, dec!(0.1));
        let two = cell_loss_rate(dec!(0.10), &curves, dec!(0.1));
        assert!(approx_eq(two, one * dec!(2), dec!(0.0000000001)));
    }

    #[test]
    fn test_full_recovery_is_zero_loss() {
        let out = forecast(&vintage_table(), 3, dec!(0.14), Decimal::ONE, 24).unwrap();
        assert!(out.iter_cells().flatten().all(|v| v.is_zero()));
    }

    #[test]
    fn test_higher_rate_means_higher_loss() {
        // More interest keeps balances higher for longer.
        let low = forecast(&single_cell(dec!(0.1)), 3, dec!(0.05), dec!(0.1), 24).unwrap();
        let high = forecast(&single_cell(dec!(0.1)), 3, dec!(0.30), dec!(0.1), 24).unwrap();
        assert!(high.get(0, 0).unwrap() > low.get(0, 0).unwrap());
    }

    #[test]
    fn test_unregistered_term_fails() {
        let err = forecast(&single_cell(dec!(0.05)), 5, dec!(0.14), dec!(0.1), 24).unwrap_err();
        assert!(matches!(err, LossRateError::UnregisteredTerm { term: 5, .. }));
    }

    #[test]
    fn test_reject_recovery_out_of_range() {
        for r in [dec!(-0.01), dec!(1.01)] {
            let err = forecast(&single_cell(dec!(0.05)), 1, dec!(0.14), r, 24).unwrap_err();
            match err {
                LossRateError::InvalidInput { field, reason } => {
                    assert_eq!(field, "recovery_rate");
                    assert!(reason.contains(&r.to_string()));
                }
                other => panic!("expected InvalidInput, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_reject_negative_interest_rate() {
        assert!(forecast(&single_cell(dec!(0.05)), 1, dec!(-0.01), dec!(0.1), 24).is_err());
    }

    #[test]
    fn test_interest_rate_beyond_decimal_range_is_an_error() {
        let err = forecast(&single_cell(dec!(0.05)), 3, dec!(40), dec!(0.1), 24).unwrap_err();
        assert!(matches!(err, LossRateError::InvalidInput { .. }));
    }

    #[test]
    fn test_very_high_interest_rate_forecasts() {
        let out = forecast(&single_cell(dec!(0.05)), 3, dec!(20), dec!(0.1), 24).unwrap();
        let loss = out.get(0, 0).unwrap();
        assert!(loss > Decimal::ZERO && loss <= dec!(0.05));
    }

    #[test]
    fn test_reject_zero_periods_per_year() {
        assert!(forecast(&single_cell(dec!(0.05)), 1, dec!(0.14), dec!(0.1), 0).is_err());
    }

    #[test]
    fn test_custom_incidence_table() {
        let mut curves = BTreeMap::new();
        curves.insert(1, vec![dec!(0.5)]);
        let table = AnnualIncidenceTable::new(curves).unwrap();
        let out =
            forecast_with_incidence(&table, &single_cell(dec!(0.05)), 1, dec!(0.14), dec!(0.1), 1)
                .unwrap();
        assert_eq!(out.get(0, 0), Some(dec!(0.01125)));
    }

    #[test]
    fn test_envelope_warnings() {
        let mut input = LossRateForecastInput::new(vintage_table(), 2);
        input.bad_rates.cells[0][0] = Some(dec!(1.5));
        let out = forecast_loss_rates(&input).unwrap();
        assert_eq!(out.warnings.len(), 2);
        assert!(out.warnings.iter().any(|w| w.contains("missing")));
        assert!(out.warnings.iter().any(|w| w.contains("outside [0, 1]")));
        assert_eq!(out.result.total_periods, 48);
        assert_eq!(out.result.periodic_rate, dec!(0.14) / dec!(24));
    }

    #[test]
    fn test_envelope_unnormalized_incidence_warning() {
        let mut curves = BTreeMap::new();
        curves.insert(1, vec![dec!(0.8)]);
        let mut input = LossRateForecastInput::new(single_cell(dec!(0.05)), 1);
        input.incidence = Some(AnnualIncidenceTable::new(curves).unwrap());
        let out = forecast_loss_rates(&input).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("sums to 0.8")));
    }

    #[test]
    fn test_envelope_rejects_empty_table() {
        let input = LossRateForecastInput::new(RateTable::new(vec![], vec![], vec![]).unwrap(), 1);
        assert!(matches!(
            forecast_loss_rates(&input),
            Err(LossRateError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_input_defaults_from_json() {
        let json = r#"{
            "bad_rates": {
                "row_labels": ["2015-01"],
                "column_labels": ["12"],
                "cells": [["0.05"]]
            },
            "term": 1
        }"#;
        let input: LossRateForecastInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.avg_interest_rate, dec!(0.14));
        assert_eq!(input.recovery_rate, dec!(0.10));
        assert_eq!(input.periods_per_year, 24);
        assert!(input.incidence.is_none());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let out = forecast_loss_rates(&LossRateForecastInput::new(vintage_table(), 3)).unwrap();
        let json = serde_json::to_string(&out).unwrap();
        let _: ComputationOutput<LossRateForecastOutput> = serde_json::from_str(&json).unwrap();
    }
}
