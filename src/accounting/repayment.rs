//! Repayment arithmetic: what a founder owes and how much of it is paid.

use rust_decimal::Decimal;
use serde::Serialize;

use super::money;
use crate::errors::{AppError, Result};

/// Goal plus simple interest: `goal + goal * rate / 100`. Fails instead of
/// overflowing for goals and rates outside the validated ranges.
pub fn calculate_total_repayment(goal: Decimal, rate: Decimal) -> Result<Decimal> {
    goal.checked_mul(rate)
        .and_then(|interest| interest.checked_div(Decimal::ONE_HUNDRED))
        .and_then(|interest| goal.checked_add(interest))
        .ok_or_else(|| {
            AppError::invalid_data(format!(
                "Total repayment for goal {} at {}% is out of range",
                goal, rate
            ))
        })
}

/// May be zero or negative once the campaign is fully repaid.
pub fn remaining_repayment(total: Decimal, repaid_sum: Decimal) -> Decimal {
    total - repaid_sum
}

pub fn repayment_progress(repaid_sum: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    repaid_sum / total * Decimal::ONE_HUNDRED
}

pub fn funding_progress(current: Decimal, goal: Decimal) -> Decimal {
    if goal.is_zero() {
        return Decimal::ZERO;
    }
    current / goal * Decimal::ONE_HUNDRED
}

pub fn is_fully_repaid(remaining: Decimal) -> bool {
    remaining <= Decimal::ZERO
}

/// Installment owed each month, rounded to the minor unit. `None` for a
/// zero-month period.
pub fn monthly_repayment_amount(total: Decimal, period_months: u32) -> Option<Decimal> {
    if period_months == 0 {
        return None;
    }
    Some(money::round_to_minor(total / Decimal::from(period_months)))
}

/// A repayment must be positive and may not exceed what is still owed.
pub fn validate_repayment_amount(amount: Decimal, remaining: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::invalid_data("Repayment amount must be greater than 0"));
    }
    if amount > remaining {
        return Err(AppError::invalid_data(format!(
            "Amount exceeds remaining repayment: {}",
            remaining.max(Decimal::ZERO)
        )));
    }
    Ok(())
}

/// A loan must be positive and may not push the campaign past its goal.
pub fn validate_loan_amount(amount: Decimal, goal: Decimal, current: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::invalid_data("Loan amount must be greater than 0"));
    }
    if amount > goal - current {
        return Err(AppError::invalid_data(format!(
            "Amount exceeds campaign goal: {} left to raise",
            (goal - current).max(Decimal::ZERO)
        )));
    }
    Ok(())
}

/// Snapshot of a campaign's repayment state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepaymentPosition {
    pub total_repayment: Decimal,
    pub repaid: Decimal,
    pub remaining: Decimal,
    pub progress: Decimal,
}

impl RepaymentPosition {
    pub fn compute<I>(goal: Decimal, rate: Decimal, verified_amounts: I) -> Result<Self>
    where
        I: IntoIterator<Item = Decimal>,
    {
        let total_repayment = calculate_total_repayment(goal, rate)?;
        let repaid: Decimal = verified_amounts.into_iter().sum();
        Ok(RepaymentPosition {
            total_repayment,
            repaid,
            remaining: remaining_repayment(total_repayment, repaid),
            progress: repayment_progress(repaid, total_repayment),
        })
    }

    pub fn is_fully_repaid(&self) -> bool {
        is_fully_repaid(self.remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn total_repayment_adds_simple_interest() {
        assert_eq!(calculate_total_repayment(d("1000"), d("10")).unwrap(), d("1100"));
        assert_eq!(calculate_total_repayment(d("2500.50"), d("0")).unwrap(), d("2500.50"));
        assert_eq!(calculate_total_repayment(d("1234.56"), d("7.25")).unwrap(), d("1324.0656"));
    }

    #[test]
    fn total_repayment_overflow_is_a_validation_error() {
        let err = calculate_total_repayment(Decimal::MAX, d("10")).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(RepaymentPosition::compute(Decimal::MAX, d("10"), Vec::new()).is_err());

        let largest = calculate_total_repayment(money::MAX_AMOUNT, money::MAX_INTEREST_RATE).unwrap();
        assert!(largest > money::MAX_AMOUNT);
    }

    #[test]
    fn total_repayment_is_exact_for_awkward_rates() {
        // 0.1 + 0.2 style drift would show up here with binary floats
        let total = calculate_total_repayment(d("0.30"), d("10")).unwrap();
        assert_eq!(total, d("0.33"));
    }

    #[test]
    fn remaining_tracks_partial_repayments() {
        let position = RepaymentPosition::compute(d("1000"), d("10"), vec![d("400"), d("300")]).unwrap();
        assert_eq!(position.total_repayment, d("1100"));
        assert_eq!(position.remaining, d("400"));
        assert!(!position.is_fully_repaid());
    }

    #[test]
    fn exact_repayment_is_fully_repaid() {
        let position = RepaymentPosition::compute(d("1000"), d("10"), vec![d("1100")]).unwrap();
        assert!(position.remaining.is_zero());
        assert!(position.is_fully_repaid());
        assert_eq!(position.progress, d("100"));
    }

    #[test]
    fn progress_is_zero_for_zero_total() {
        assert_eq!(repayment_progress(d("50"), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(funding_progress(d("50"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn funding_progress_is_a_percentage() {
        assert_eq!(funding_progress(d("250"), d("1000")), d("25"));
    }

    #[test]
    fn monthly_amount_rounds_to_minor_unit() {
        assert_eq!(monthly_repayment_amount(d("1100"), 3), Some(d("366.67")));
        assert_eq!(monthly_repayment_amount(d("1100"), 0), None);
    }

    #[test]
    fn repayment_above_remaining_is_rejected() {
        let err = validate_repayment_amount(d("500.01"), d("500")).unwrap_err();
        assert!(err.to_string().contains("exceeds remaining repayment"));
        assert!(validate_repayment_amount(d("500"), d("500")).is_ok());
        assert!(validate_repayment_amount(Decimal::ZERO, d("500")).is_err());
    }

    #[test]
    fn loan_above_goal_is_rejected() {
        assert!(validate_loan_amount(d("600"), d("1000"), d("500")).is_err());
        assert!(validate_loan_amount(d("500"), d("1000"), d("500")).is_ok());
        assert!(validate_loan_amount(d("-1"), d("1000"), d("0")).is_err());
    }
}
