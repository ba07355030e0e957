use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::{AppError, Result};

/// Decimal places of the platform currency's minor unit (kobo, cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

const MINOR_UNITS_PER_MAJOR: Decimal = Decimal::ONE_HUNDRED;

/// Largest amount a campaign goal, loan, repayment or withdrawal may carry:
/// twelve digits, two of them after the point.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Largest interest rate in percent: five digits, two after the point.
pub const MAX_INTEREST_RATE: Decimal = Decimal::from_parts(99_999, 0, 0, false, 2);

/// Rounds to the nearest minor unit, halves away from zero.
pub fn round_to_minor(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Truncates towards zero at the minor unit.
pub fn floor_to_minor(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::ToZero)
}

/// Converts a major-unit amount into the integer minor units the gateway expects.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    let scaled = amount
        .checked_mul(MINOR_UNITS_PER_MAJOR)
        .ok_or_else(|| AppError::invalid_data(format!("Amount {} is out of range", amount)))?;
    if !scaled.fract().is_zero() {
        return Err(AppError::invalid_data(format!(
            "Amount {} is more precise than the currency's minor unit",
            amount
        )));
    }
    scaled
        .to_i64()
        .ok_or_else(|| AppError::invalid_data(format!("Amount {} is out of range", amount)))
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE)
}
