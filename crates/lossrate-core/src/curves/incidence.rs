//! Default-incidence curves.
//!
//! An annual incidence curve states, for each year of a loan's term, what
//! share of the eventually-bad portfolio goes bad during that year. The
//! periodic curve spreads each year's share evenly across the payment
//! periods of that year.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::LossRateError;
use crate::types::Fraction;
use crate::LossRateResult;

/// Tolerance used when checking that an annual curve sums to one.
pub const INCIDENCE_SUM_TOLERANCE: Decimal = dec!(0.000000001);

/// Annual incidence curves keyed by loan term in years.
///
/// Immutable once built; pass it by reference to every forecast that needs
/// it. [`AnnualIncidenceTable::reference`] is the production configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<u32, Vec<Fraction>>", into = "BTreeMap<u32, Vec<Fraction>>")]
pub struct AnnualIncidenceTable {
    curves: BTreeMap<u32, Vec<Fraction>>,
}

impl AnnualIncidenceTable {
    /// Build a table from `term -> annual fractions`, one fraction per year.
    pub fn new(curves: BTreeMap<u32, Vec<Fraction>>) -> LossRateResult<Self> {
        if curves.is_empty() {
            return Err(LossRateError::InvalidConfiguration(
                "annual incidence table has no terms".into(),
            ));
        }
        for (term, annual) in &curves {
            if *term == 0 {
                return Err(LossRateError::InvalidConfiguration(
                    "annual incidence term must be at least 1 year".into(),
                ));
            }
            if annual.len() != *term as usize {
                return Err(LossRateError::InvalidConfiguration(format!(
                    "term {term} needs {term} annual fractions, got {}",
                    annual.len()
                )));
            }
            if let Some(neg) = annual.iter().find(|a| **a < Decimal::ZERO) {
                return Err(LossRateError::InvalidConfiguration(format!(
                    "term {term} has negative annual incidence {neg}"
                )));
            }
        }
        Ok(Self { curves })
    }

    /// Reference curves for 1, 2 and 3 year installment loans.
    pub fn reference() -> Self {
        let mut curves = BTreeMap::new();
        curves.insert(3, vec![dec!(0.233), dec!(0.367), dec!(0.400)]);
        curves.insert(2, vec![dec!(0.388), dec!(0.612)]);
        curves.insert(1, vec![dec!(1.0)]);
        Self { curves }
    }

    /// Annual fractions for `term`, year 1 first.
    pub fn annual(&self, term: u32) -> LossRateResult<&[Fraction]> {
        self.curves
            .get(&term)
            .map(Vec::as_slice)
            .ok_or_else(|| LossRateError::UnregisteredTerm {
                term,
                registered: self.registered_terms_label(),
            })
    }

    pub fn contains(&self, term: u32) -> bool {
        self.curves.contains_key(&term)
    }

    /// Registered terms in ascending order.
    pub fn terms(&self) -> impl Iterator<Item = u32> + '_ {
        self.curves.keys().copied()
    }

    /// Terms whose annual fractions do not sum to one.
    pub fn unnormalized_terms(&self) -> Vec<(u32, Decimal)> {
        self.curves
            .iter()
            .map(|(term, annual)| (*term, annual.iter().copied().sum::<Decimal>()))
            .filter(|(_, sum)| (*sum - Decimal::ONE).abs() > INCIDENCE_SUM_TOLERANCE)
            .collect()
    }

    /// Expand the annual curve for `term` into `term * periods_per_year`
    /// periodic fractions.
    pub fn periodic_incidence(
        &self,
        term: u32,
        periods_per_year: u32,
    ) -> LossRateResult<IncidenceCurve> {
        if periods_per_year == 0 {
            return Err(LossRateError::InvalidInput {
                field: "periods_per_year".into(),
                reason: "Periods per year must be > 0, got 0".into(),
            });
        }
        let annual = self.annual(term)?;
        let per_year = Decimal::from(periods_per_year);

        let fractions: Vec<Fraction> = annual
            .iter()
            .flat_map(|a| std::iter::repeat(a / per_year).take(periods_per_year as usize))
            .collect();

        tracing::debug!(
            term,
            periods_per_year,
            periods = fractions.len(),
            "expanded annual incidence curve"
        );

        Ok(IncidenceCurve {
            term,
            periods_per_year,
            fractions,
        })
    }

    fn registered_terms_label(&self) -> String {
        self.terms()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for AnnualIncidenceTable {
    fn default() -> Self {
        Self::reference()
    }
}

impl TryFrom<BTreeMap<u32, Vec<Fraction>>> for AnnualIncidenceTable {
    type Error = LossRateError;

    fn try_from(curves: BTreeMap<u32, Vec<Fraction>>) -> Result<Self, Self::Error> {
        Self::new(curves)
    }
}

impl From<AnnualIncidenceTable> for BTreeMap<u32, Vec<Fraction>> {
    fn from(table: AnnualIncidenceTable) -> Self {
        table.curves
    }
}

/// Share of total defaults falling in each period, period 1 first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidenceCurve {
    pub term: u32,
    pub periods_per_year: u32,
    /// `fractions[k]` is the incidence of period `k + 1`.
    pub fractions: Vec<Fraction>,
}

impl IncidenceCurve {
    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    /// Incidence of `period` (1-based). `None` outside `1..=len`.
    pub fn get(&self, period: usize) -> Option<Fraction> {
        period
            .checked_sub(1)
            .and_then(|i| self.fractions.get(i))
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Fraction> + '_ {
        self.fractions.iter().copied()
    }

    pub fn total(&self) -> Fraction {
        self.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_terms() {
        let table = AnnualIncidenceTable::reference();
        assert_eq!(table.terms().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(table.unnormalized_terms().is_empty());
    }

    #[test]
    fn test_term_three_semi_monthly() {
        let curve = AnnualIncidenceTable::reference()
            .periodic_incidence(3, 24)
            .unwrap();
        assert_eq!(curve.len(), 72);
        assert_eq!(curve.get(1), Some(dec!(0.233) / dec!(24)));
        assert_eq!(curve.get(24), Some(dec!(0.233) / dec!(24)));
        // Year 2 continues the period count rather than restarting.
        assert_eq!(curve.get(25), Some(dec!(0.367) / dec!(24)));
        assert_eq!(curve.get(72), Some(dec!(0.400) / dec!(24)));
        assert!((curve.total() - Decimal::ONE).abs() < INCIDENCE_SUM_TOLERANCE);
    }

    #[test]
    fn test_single_period_per_year_is_annual_curve() {
        let curve = AnnualIncidenceTable::reference()
            .periodic_incidence(2, 1)
            .unwrap();
        assert_eq!(curve.fractions, vec![dec!(0.388), dec!(0.612)]);
    }

    #[test]
    fn test_unregistered_term_is_configuration_error() {
        let err = AnnualIncidenceTable::reference()
            .periodic_incidence(5, 24)
            .unwrap_err();
        match err {
            LossRateError::UnregisteredTerm { term, registered } => {
                assert_eq!(term, 5);
                assert_eq!(registered, "1, 2, 3");
            }
            other => panic!("expected UnregisteredTerm, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_periods_per_year_rejected() {
        let err = AnnualIncidenceTable::reference()
            .periodic_incidence(1, 0)
            .unwrap_err();
        assert!(matches!(err, LossRateError::InvalidInput { .. }));
    }

    #[test]
    fn test_custom_table() {
        let mut curves = BTreeMap::new();
        curves.insert(4, vec![dec!(0.1), dec!(0.2), dec!(0.3), dec!(0.4)]);
        let table = AnnualIncidenceTable::new(curves).unwrap();
        assert!(!table.contains(3));
        let curve = table.periodic_incidence(4, 12).unwrap();
        assert_eq!(curve.len(), 48);
        assert!((curve.total() - Decimal::ONE).abs() < INCIDENCE_SUM_TOLERANCE);
    }

    #[test]
    fn test_reject_length_mismatch() {
        let mut curves = BTreeMap::new();
        curves.insert(2, vec![dec!(1.0)]);
        assert!(AnnualIncidenceTable::new(curves).is_err());
    }

    #[test]
    fn test_reject_negative_fraction() {
        let mut curves = BTreeMap::new();
        curves.insert(2, vec![dec!(1.2), dec!(-0.2)]);
        assert!(AnnualIncidenceTable::new(curves).is_err());
    }

    #[test]
    fn test_reject_empty_table() {
        assert!(AnnualIncidenceTable::new(BTreeMap::new()).is_err());
    }

    #[test]
    fn test_unnormalized_terms_reported() {
        let mut curves = BTreeMap::new();
        curves.insert(2, vec![dec!(0.5), dec!(0.4)]);
        let table = AnnualIncidenceTable::new(curves).unwrap();
        assert_eq!(table.unnormalized_terms(), vec![(2, dec!(0.9))]);
    }

    #[test]
    fn test_json_roundtrip_validates() {
        let table: AnnualIncidenceTable =
            serde_json::from_str(r#"{"1": ["1.0"], "2": ["0.388", "0.612"]}"#).unwrap();
        assert_eq!(table.annual(2).unwrap(), &[dec!(0.388), dec!(0.612)]);

        let bad: Result<AnnualIncidenceTable, _> = serde_json::from_str(r#"{"2": ["1.0"]}"#);
        assert!(bad.is_err());
    }
}
