use rust_decimal::{Decimal, MathematicalOps};

use crate::error::LossRateError;
use crate::types::{Money, Rate};
use crate::LossRateResult;

/// (1 + rate)^nper as an exact integer power.
///
/// Fails with `InvalidInput` when the factor leaves the `Decimal` range.
pub fn compound_factor(rate: Rate, nper: u32) -> LossRateResult<Decimal> {
    (Decimal::ONE + rate)
        .checked_powu(u64::from(nper))
        .ok_or_else(|| LossRateError::InvalidInput {
            field: "rate".into(),
            reason: format!("(1 + {rate})^{nper} exceeds the decimal range"),
        })
}

/// Level payment that fully amortizes `principal` over `nper` periods at a
/// periodic `rate`. Returned as a positive amount.
pub fn pmt(rate: Rate, nper: u32, principal: Money) -> LossRateResult<Money> {
    if nper == 0 {
        return Err(LossRateError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }
    if rate < Decimal::ZERO {
        return Err(LossRateError::InvalidInput {
            field: "rate".into(),
            reason: format!("Periodic rate cannot be negative, got {rate}"),
        });
    }

    if rate.is_zero() {
        return Ok(principal / Decimal::from(nper));
    }

    // principal * r / (1 - (1 + r)^-n) stays bounded by principal * (1 + r).
    let factor = compound_factor(rate, nper)?;
    let discounted = Decimal::ONE - Decimal::ONE / factor;

    if discounted.is_zero() {
        return Err(LossRateError::InvalidInput {
            field: "rate".into(),
            reason: "PMT annuity factor collapsed to zero".into(),
        });
    }

    principal
        .checked_mul(rate)
        .map(|interest| interest / discounted)
        .ok_or_else(|| LossRateError::InvalidInput {
            field: "principal".into(),
            reason: format!("Interest on {principal} at {rate} exceeds the decimal range"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_compound_factor_zero_periods() {
        assert_eq!(compound_factor(dec!(0.05), 0).unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_compound_factor_exact() {
        assert_eq!(compound_factor(dec!(0.10), 3).unwrap(), dec!(1.331));
    }

    #[test]
    fn test_compound_factor_overflow_is_an_error() {
        // 40 / 24 per period over 72 periods is about 1e30.
        let err = compound_factor(dec!(40) / dec!(24), 72).unwrap_err();
        assert!(matches!(err, LossRateError::InvalidInput { ref field, .. } if field == "rate"));
    }

    #[test]
    fn test_pmt_large_rate_within_range() {
        // Payment approaches principal * rate as the factor grows.
        let p = pmt(dec!(10), 20, Decimal::ONE).unwrap();
        assert!(p > dec!(10));
        assert!(p < dec!(10.000001));
    }

    #[test]
    fn test_pmt_zero_rate_is_straight_line() {
        assert_eq!(pmt(Decimal::ZERO, 4, dec!(100)).unwrap(), dec!(25));
    }

    #[test]
    fn test_pmt_single_period_repays_with_interest() {
        let p = pmt(dec!(0.14), 1, Decimal::ONE).unwrap();
        assert!((p - dec!(1.14)).abs() < dec!(0.0000000001));
    }

    #[test]
    fn test_pmt_mortgage_like() {
        // 100k over 360 months at 6%/12: ~599.55
        let p = pmt(dec!(0.005), 360, dec!(100_000)).unwrap();
        assert!((p - dec!(599.55)).abs() < dec!(0.01));
    }

    #[test]
    fn test_pmt_rejects_zero_periods() {
        assert!(pmt(dec!(0.01), 0, Decimal::ONE).is_err());
    }

    #[test]
    fn test_pmt_rejects_negative_rate() {
        assert!(pmt(dec!(-0.01), 12, Decimal::ONE).is_err());
    }
}
