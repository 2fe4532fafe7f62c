//! Helpers for forecasting a directory of bad-rate tables.
//!
//! Nothing here touches the filesystem; the caller lists files and reads
//! tables, then uses these helpers to name outputs, infer terms and reuse
//! curves across tables that share a term.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::curves::AnnualIncidenceTable;
use crate::forecast::engine::{forecast_with_curves, ForecastCurves};
use crate::forecast::table::RateTable;
use crate::types::Rate;
use crate::LossRateResult;

/// Number of bad-rate tables a complete monthly run produces.
pub const DEFAULT_EXPECTED_TABLES: usize = 12;

/// Default file suffix for bad-rate tables.
pub const TABLE_SUFFIX: &str = ".csv";

/// First `_`-delimited token of the file stem that parses as a whole number.
///
/// `"badrates_3_prime.csv"` gives `Some(3)`; a name with no numeric token
/// gives `None`.
pub fn extract_term_from_filename(filename: &str) -> Option<u32> {
    let stem = match filename.rfind('.') {
        Some(dot) if dot > 0 => &filename[..dot],
        _ => filename,
    };
    stem.split('_').find_map(|token| token.trim().parse::<u32>().ok())
}

/// Output name for a bad-rate table file.
pub fn loss_rate_filename(filename: &str) -> String {
    filename.replace("badrates", "lossrates")
}

pub fn is_table_file(filename: &str, suffix: &str) -> bool {
    filename.ends_with(suffix)
}

/// Data-quality warning when a run finds an unexpected number of tables.
pub fn table_count_warning(found: usize, expected: usize) -> Option<String> {
    (found != expected)
        .then(|| format!("found {found} bad rate tables, expected {expected}"))
}

/// Per-file outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Forecast {
        input: String,
        output: String,
        term: u32,
        rows: usize,
        columns: usize,
    },
    Failed {
        input: String,
        reason: String,
    },
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub tables_found: usize,
    pub tables_forecast: usize,
    pub tables_failed: usize,
    pub outcomes: Vec<TableOutcome>,
    pub warnings: Vec<String>,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: TableOutcome) {
        match outcome {
            TableOutcome::Forecast { .. } => self.tables_forecast += 1,
            TableOutcome::Failed { .. } => self.tables_failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CurveKey {
    term: u32,
    periods_per_year: u32,
    avg_interest_rate: Rate,
}

/// Memoized forecast curves for one annual incidence table.
#[derive(Debug)]
pub struct CurveCache<'a> {
    incidence_table: &'a AnnualIncidenceTable,
    curves: HashMap<CurveKey, ForecastCurves>,
}

impl<'a> CurveCache<'a> {
    pub fn new(incidence_table: &'a AnnualIncidenceTable) -> Self {
        Self {
            incidence_table,
            curves: HashMap::new(),
        }
    }

    pub fn incidence_table(&self) -> &AnnualIncidenceTable {
        self.incidence_table
    }

    /// Curves for the combination, built on first use.
    pub fn curves(
        &mut self,
        term: u32,
        avg_interest_rate: Rate,
        periods_per_year: u32,
    ) -> LossRateResult<&ForecastCurves> {
        let key = CurveKey {
            term,
            periods_per_year,
            avg_interest_rate: avg_interest_rate.normalize(),
        };
        if !self.curves.contains_key(&key) {
            let built = ForecastCurves::build(
                self.incidence_table,
                term,
                avg_interest_rate,
                periods_per_year,
            )?;
            self.curves.insert(key, built);
        } else {
            tracing::debug!(term, periods_per_year, "reusing cached forecast curves");
        }
        Ok(&self.curves[&key])
    }

    /// Forecast `bad_rates` with cached curves.
    pub fn forecast(
        &mut self,
        bad_rates: &RateTable,
        term: u32,
        avg_interest_rate: Rate,
        recovery_rate: Rate,
        periods_per_year: u32,
    ) -> LossRateResult<RateTable> {
        let curves = self.curves(term, avg_interest_rate, periods_per_year)?;
        forecast_with_curves(bad_rates, curves, recovery_rate)
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}
