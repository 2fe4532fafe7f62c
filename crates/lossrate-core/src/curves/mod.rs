//! Curves shared by every cell of a forecast: the amortization balance
//! curve and the periodic default-incidence curve.

pub mod amortization;
pub mod incidence;

pub use amortization::{balance_curve, BalanceCurve};
pub use incidence::{AnnualIncidenceTable, IncidenceCurve};
