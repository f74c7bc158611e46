//! Money helpers for Vietnamese đồng.
//!
//! The shop trades in a single currency. VND has no minor unit, so amounts are
//! stored as `NUMERIC` but always rounded to whole đồng before they are shown
//! or persisted as order totals.

use rust_decimal::{Decimal, RoundingStrategy};

/// ISO 4217 code of the only currency the shop sells in.
pub const CURRENCY_CODE: &str = "VND";

/// Symbol appended to formatted amounts.
const CURRENCY_SYMBOL: &str = "₫";

/// Round an amount to whole đồng, midpoint away from zero.
#[must_use]
pub fn round_dong(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount the way Vietnamese shoppers read prices.
///
/// Rounds to whole đồng, groups thousands with `.` and appends ` ₫`.
///
/// ```
/// use rust_decimal::Decimal;
/// use senmarket_core::format_vnd;
///
/// assert_eq!(format_vnd(Decimal::from(1_250_000)), "1.250.000 ₫");
/// assert_eq!(format_vnd(Decimal::ZERO), "0 ₫");
/// ```
#[must_use]
pub fn format_vnd(amount: Decimal) -> String {
    let rounded = round_dong(amount);
    let digits = rounded.abs().trunc().normalize().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        grouped.push('-');
    }

    let len = digits.len();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    grouped.push(' ');
    grouped.push_str(CURRENCY_SYMBOL);
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_small_amounts() {
        assert_eq!(format_vnd(Decimal::from(0)), "0 ₫");
        assert_eq!(format_vnd(Decimal::from(5)), "5 ₫");
        assert_eq!(format_vnd(Decimal::from(999)), "999 ₫");
    }

    #[test]
    fn test_format_groups_thousands() {
        assert_eq!(format_vnd(Decimal::from(1_000)), "1.000 ₫");
        assert_eq!(format_vnd(Decimal::from(30_000)), "30.000 ₫");
        assert_eq!(format_vnd(Decimal::from(1_250_000)), "1.250.000 ₫");
        assert_eq!(format_vnd(Decimal::from(123_456_789)), "123.456.789 ₫");
    }

    #[test]
    fn test_format_rounds_fractional_dong() {
        // 19_999.5 rounds up, 19_999.4 rounds down
        assert_eq!(format_vnd(Decimal::new(199_995, 1)), "20.000 ₫");
        assert_eq!(format_vnd(Decimal::new(199_994, 1)), "19.999 ₫");
    }

    #[test]
    fn test_format_ignores_storage_scale() {
        // NUMERIC(15,2) columns come back with two decimal places
        assert_eq!(format_vnd(Decimal::new(15_000_000, 2)), "150.000 ₫");
    }

    #[test]
    fn test_format_negative() {
        assert_eq!(format_vnd(Decimal::from(-45_000)), "-45.000 ₫");
    }

    #[test]
    fn test_round_dong_midpoint() {
        assert_eq!(round_dong(Decimal::new(25, 1)), Decimal::from(3));
        assert_eq!(round_dong(Decimal::new(-25, 1)), Decimal::from(-3));
    }
}
