//! Remaining-balance curve of a fixed-rate, fully amortizing loan.
//!
//! Each period pays a constant amount covering interest on the outstanding
//! balance plus principal, sized so the balance reaches zero at the final
//! period. A zero rate degenerates to equal principal installments.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LossRateError;
use crate::time_value;
use crate::types::{Money, Rate};
use crate::LossRateResult;

/// Remaining balance after each period, period 1 first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceCurve {
    /// Balance before any payment is made.
    pub principal: Money,
    /// Level payment per period.
    pub payment: Money,
    /// `balances[k]` is the balance after period `k + 1`.
    pub balances: Vec<Money>,
}

impl BalanceCurve {
    /// Number of periods in the schedule.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Balance after `period` (1-based). `None` outside `1..=len`.
    pub fn get(&self, period: usize) -> Option<Money> {
        period
            .checked_sub(1)
            .and_then(|i| self.balances.get(i))
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Money> + '_ {
        self.balances.iter().copied()
    }
}

/// Build the remaining-balance curve for `total_periods` payments at
/// `periodic_rate` on `principal`.
pub fn balance_curve(
    periodic_rate: Rate,
    total_periods: u32,
    principal: Money,
) -> LossRateResult<BalanceCurve> {
    validate_balance_inputs(periodic_rate, total_periods, principal)?;

    let payment = time_value::pmt(periodic_rate, total_periods, principal)?;
    let mut balances = Vec::with_capacity(total_periods as usize);
    let mut balance = principal;

    for period in 1..=total_periods {
        balance = balance
            .checked_mul(periodic_rate)
            .and_then(|interest| balance.checked_add(interest))
            .map(|accrued| accrued - payment)
            .ok_or_else(|| LossRateError::InvalidInput {
                field: "periodic_rate".into(),
                reason: format!("Balance accrual at {periodic_rate} exceeds the decimal range"),
            })?;

        // Rounding residue can leave dust of either sign. The last payment
        // retires the loan by construction.
        if period == total_periods || balance < Decimal::ZERO {
            balance = Decimal::ZERO;
        }
        balances.push(balance);
    }

    tracing::debug!(
        %periodic_rate,
        total_periods,
        %payment,
        "built amortization balance curve"
    );

    Ok(BalanceCurve {
        principal,
        payment,
        balances,
    })
}

fn validate_balance_inputs(
    periodic_rate: Rate,
    total_periods: u32,
    principal: Money,
) -> LossRateResult<()> {
    if total_periods == 0 {
        return Err(LossRateError::InvalidInput {
            field: "total_periods".into(),
            reason: "Total periods must be > 0, got 0".into(),
        });
    }
    if periodic_rate < Decimal::ZERO {
        return Err(LossRateError::InvalidInput {
            field: "periodic_rate".into(),
            reason: format!("Periodic rate cannot be negative, got {periodic_rate}"),
        });
    }
    if principal <= Decimal::ZERO {
        return Err(LossRateError::InvalidInput {
            field: "principal".into(),
            reason: format!("Principal must be positive, got {principal}"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
