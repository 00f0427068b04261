//! Common numeric types and helpers used across the ledger

use rust_decimal::{Decimal, RoundingStrategy};

/// Largest difference, in base units, at which two stock quantities are
/// still considered equal. Allocation remainders at or below this value
/// count as fully satisfied.
pub const QUANTITY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Decimal places kept on money amounts
pub const MONEY_SCALE: u32 = 2;

/// Compare two quantities within [`QUANTITY_TOLERANCE`]
pub fn quantities_equal(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= QUANTITY_TOLERANCE
}

/// True when a quantity is too small to matter for stock purposes
pub fn is_negligible(quantity: Decimal) -> bool {
    quantity.abs() <= QUANTITY_TOLERANCE
}

/// Round a money amount to [`MONEY_SCALE`] places, midpoint away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Amount of one priced line, rounded to money precision. `None` when the
/// product does not fit in a `Decimal`.
pub fn checked_line_amount(quantity: Decimal, unit_price: Decimal) -> Option<Decimal> {
    quantity.checked_mul(unit_price).map(round_money)
}

/// Split `total` across `weights` proportionally, rounding every share to
/// money precision. The last share absorbs the rounding remainder so the
/// shares always sum to `round_money(total)`.
pub fn split_money(total: Decimal, weights: &[Decimal]) -> Vec<Decimal> {
    let total = round_money(total);
    let weight_sum: Decimal = weights.iter().sum();
    if weights.is_empty() {
        return Vec::new();
    }
    if weight_sum.is_zero() {
        let mut shares = vec![Decimal::ZERO; weights.len()];
        if let Some(last) = shares.last_mut() {
            *last = total;
        }
        return shares;
    }

    let mut shares = Vec::with_capacity(weights.len());
    let mut allotted = Decimal::ZERO;
    for (idx, weight) in weights.iter().enumerate() {
        if idx + 1 == weights.len() {
            shares.push(total - allotted);
        } else {
            let share = round_money(total * (*weight / weight_sum));
            allotted += share;
            shares.push(share);
        }
    }
    shares
}
