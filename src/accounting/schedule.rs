//! Monthly installment schedule.
//!
//! Calendar arithmetic happens in the configured business timezone; the
//! instants going in and out are UTC.

use chrono::{DateTime, Datelike, FixedOffset, Months, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyDueInfo {
    pub monthly_repayment: Decimal,
    pub installments_due: u32,
    pub installments_paid: u32,
    pub next_due_date: DateTime<Utc>,
    pub due_this_month: bool,
    pub amount_due: Decimal,
}

/// Adds calendar months, clamping to the last day of shorter months.
pub fn add_months(ts: DateTime<Utc>, months: u32, tz: &FixedOffset) -> Option<DateTime<Utc>> {
    ts.with_timezone(tz)
        .checked_add_months(Months::new(months))
        .map(|local| local.with_timezone(&Utc))
}

/// Whole calendar months from `start` to `end`. A month only counts once the
/// same day-of-month and time of day has been reached.
pub fn whole_months_between(start: DateTime<Utc>, end: DateTime<Utc>, tz: &FixedOffset) -> u32 {
    let start = start.with_timezone(tz);
    let end = end.with_timezone(tz);
    if end <= start {
        return 0;
    }

    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    if (end.day(), end.time()) < (start.day(), start.time()) {
        months -= 1;
    }
    u32::try_from(months).unwrap_or(0)
}

/// Installment status as of `now`. Unfunded campaigns have no schedule.
///
/// `installments_paid` is the number of verified repayments, whatever their
/// size; a large repayment still counts as a single installment.
pub fn monthly_due_info(
    funded_at: Option<DateTime<Utc>>,
    monthly_amount: Option<Decimal>,
    installments_paid: u32,
    now: DateTime<Utc>,
    tz: &FixedOffset,
) -> Option<MonthlyDueInfo> {
    let funded_at = funded_at?;
    let monthly_repayment = monthly_amount.unwrap_or(Decimal::ZERO);

    let installments_due = whole_months_between(funded_at, now, tz);
    let next_due_date = add_months(funded_at, installments_paid.saturating_add(1), tz)?;
    let due_this_month = installments_due > installments_paid;
    let amount_due = if due_this_month {
        monthly_repayment
    } else {
        Decimal::ZERO
    };

    Some(MonthlyDueInfo {
        monthly_repayment,
        installments_due,
        installments_paid,
        next_due_date,
        due_this_month,
        amount_due,
    })
}
