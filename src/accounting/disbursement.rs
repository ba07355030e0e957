//! Splits a fully repaid campaign's total among its lenders.
//!
//! Each lender's share is proportional to the sum of their loans. Shares are
//! truncated to the minor unit and the leftover minor units go to the
//! largest remainders, so the shares always add up to the (rounded) total.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::money::{self, MINOR_UNIT_SCALE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LenderShare<K> {
    pub lender_id: K,
    pub amount: Decimal,
}

/// Computes per-lender payouts. Returns an empty plan when nothing was
/// loaned, so callers never divide by zero.
pub fn split_disbursement<K, I>(loans: I, total_repayment: Decimal) -> Vec<LenderShare<K>>
where
    K: Ord,
    I: IntoIterator<Item = (K, Decimal)>,
{
    let mut contributed: BTreeMap<K, Decimal> = BTreeMap::new();
    for (lender_id, amount) in loans {
        *contributed.entry(lender_id).or_insert(Decimal::ZERO) += amount;
    }

    let total_donated: Decimal = contributed.values().copied().sum();
    if total_donated <= Decimal::ZERO || total_repayment <= Decimal::ZERO {
        return Vec::new();
    }

    let mut shares = Vec::with_capacity(contributed.len());
    let mut remainders = Vec::with_capacity(contributed.len());
    for (index, (lender_id, amount)) in contributed.into_iter().enumerate() {
        let exact = amount * total_repayment / total_donated;
        let floored = money::floor_to_minor(exact);
        remainders.push((exact - floored, index));
        shares.push(LenderShare {
            lender_id,
            amount: floored,
        });
    }

    let target = money::round_to_minor(total_repayment);
    let allocated: Decimal = shares.iter().map(|share| share.amount).sum();
    let minor_unit = Decimal::new(1, MINOR_UNIT_SCALE);
    let leftover = ((target - allocated) / minor_unit).to_usize().unwrap_or(0);

    // Largest remainder first; BTreeMap order already breaks ties by lender.
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, index) in remainders.iter().cycle().take(leftover) {
        shares[*index].amount += minor_unit;
    }

    shares.retain(|share| share.amount > Decimal::ZERO);
    shares
}
