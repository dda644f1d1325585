use rust_decimal::Decimal;

use crate::domain::{ConsumerShare, PRO_RATA_SENTINEL};

/// Lower bound of the accepted sum band (inclusive).
pub const SUM_LOWER_BOUND: Decimal = Decimal::from_parts(999, 0, 0, false, 3);
/// Upper bound of the accepted sum band (inclusive).
pub const SUM_UPPER_BOUND: Decimal = Decimal::from_parts(1001, 0, 0, false, 3);

/// Checks that a set of shares adds up to one, within `[0.999, 1.001]`.
///
/// With `allow_sentinel`, any `-1` is left out of the sum and makes the set
/// valid regardless of the remaining values: the remainder goes to the
/// pro-rata consumers at allocation time. Empty input is never valid.
pub fn validate_sum_to_one(values: &[Decimal], allow_sentinel: bool) -> bool {
    if values.is_empty() {
        return false;
    }

    let mut sum = Decimal::ZERO;
    let mut has_sentinel = false;
    for value in values {
        if allow_sentinel && *value == PRO_RATA_SENTINEL {
            has_sentinel = true;
        } else {
            sum += *value;
        }
    }

    if has_sentinel {
        return true;
    }
    sum >= SUM_LOWER_BOUND && sum <= SUM_UPPER_BOUND
}

/// Typed counterpart of [`validate_sum_to_one`] for consumer shares.
///
/// Only `ProRata` acts as the sentinel; a `Fixed(-1)` is summed like any
/// other fixed share.
pub fn consumer_shares_sum_to_one(shares: &[ConsumerShare]) -> bool {
    if shares.is_empty() {
        return false;
    }
    if shares.iter().any(ConsumerShare::is_pro_rata) {
        return true;
    }
    let values: Vec<Decimal> = shares.iter().map(ConsumerShare::as_percentage).collect();
    validate_sum_to_one(&values, false)
}
