//! Order totals and coupon evaluation.
//!
//! Every place that shows or stores money goes through [`Quote`]: the cart
//! summary, coupon validation, order placement and all order read views.
//!
//! ```text
//! subtotal  = Σ unit_price × quantity
//! discount  = coupon(subtotal)            (0 ≤ discount ≤ subtotal)
//! shipping  = policy(subtotal − discount) (0 for an empty order)
//! total     = subtotal − discount + shipping
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CouponKind, format_vnd, round_dong};

/// Upper bound for a percentage coupon.
const MAX_PERCENTAGE: Decimal = Decimal::ONE_HUNDRED;

/// Exclusive upper bound for any amount the shop stores: 10^13 đồng, the
/// range of a `NUMERIC(15,2)` column.
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(1_316_134_912, 2_328, 0, false, 0);

/// A priced line of a cart or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    /// Price of one unit at the time of pricing.
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl PricedLine {
    #[must_use]
    pub const fn new(unit_price: Decimal, quantity: u32) -> Self {
        Self {
            unit_price,
            quantity,
        }
    }

    /// `unit_price × quantity`, or `None` past the range of `Decimal`.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Sum of all line totals, or `None` on overflow.
fn checked_subtotal(lines: &[PricedLine]) -> Option<Decimal> {
    lines.iter().try_fold(Decimal::ZERO, |sum, line| {
        sum.checked_add(line.line_total()?)
    })
}

/// Why a coupon cannot be applied right now.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon is not active")]
    Inactive,

    #[error("coupon is not valid until {starts_at}")]
    NotStarted { starts_at: DateTime<Utc> },

    #[error("coupon has expired")]
    Expired,

    #[error("coupon usage limit has been reached")]
    UsageLimitReached,

    #[error("order subtotal must be at least {}", format_vnd(*minimum))]
    BelowMinimum { minimum: Decimal },
}

impl CouponRejection {
    /// Stable machine-readable reason for API clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::NotStarted { .. } => "not_started",
            Self::Expired => "expired",
            Self::UsageLimitReached => "usage_limit_reached",
            Self::BelowMinimum { .. } => "below_minimum",
        }
    }
}

/// Why a cart or order could not be priced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("coupon rejected: {0}")]
    Coupon(#[from] CouponRejection),

    #[error("order amount must be less than {}", format_vnd(AMOUNT_LIMIT))]
    AmountTooLarge,
}

impl QuoteError {
    /// Stable machine-readable reason for API clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Coupon(rejection) => rejection.code(),
            Self::AmountTooLarge => "amount_too_large",
        }
    }
}

/// Invalid coupon definition (admin input).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TermsError {
    #[error("coupon value must be greater than zero")]
    NonPositiveValue,

    #[error("percentage must not exceed 100")]
    PercentageTooLarge,

    #[error("maximum discount must be greater than zero")]
    NonPositiveCap,

    #[error("minimum order amount cannot be negative")]
    NegativeMinimum,

    #[error("usage limit must be at least 1")]
    InvalidUsageLimit,

    #[error("expiry must be after the start date")]
    InvalidWindow,
}

/// The rules of a coupon, independent of how it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponTerms {
    pub kind: CouponKind,
    /// Percentage (0, 100] or fixed amount in đồng.
    pub value: Decimal,
    /// Cap on a percentage discount.
    pub max_discount: Option<Decimal>,
    pub min_order_amount: Decimal,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl CouponTerms {
    /// Validate a coupon definition before it is saved.
    ///
    /// # Errors
    ///
    /// Returns the first rule the definition breaks.
    pub fn validate(&self) -> Result<(), TermsError> {
        if self.value <= Decimal::ZERO {
            return Err(TermsError::NonPositiveValue);
        }
        if self.kind == CouponKind::Percentage && self.value > MAX_PERCENTAGE {
            return Err(TermsError::PercentageTooLarge);
        }
        if self.max_discount.is_some_and(|cap| cap <= Decimal::ZERO) {
            return Err(TermsError::NonPositiveCap);
        }
        if self.min_order_amount < Decimal::ZERO {
            return Err(TermsError::NegativeMinimum);
        }
        if self.usage_limit.is_some_and(|limit| limit < 1) {
            return Err(TermsError::InvalidUsageLimit);
        }
        if let (Some(starts), Some(expires)) = (self.starts_at, self.expires_at)
            && expires <= starts
        {
            return Err(TermsError::InvalidWindow);
        }
        Ok(())
    }

    /// Check whether the coupon applies to `subtotal` at `now`.
    ///
    /// The checks run in a fixed order and the first failure wins: active
    /// flag, start date, expiry, usage limit, minimum order amount.
    ///
    /// # Errors
    ///
    /// Returns the reason the coupon is rejected.
    pub fn check(&self, subtotal: Decimal, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if let Some(starts_at) = self.starts_at
            && now < starts_at
        {
            return Err(CouponRejection::NotStarted { starts_at });
        }
        if self.expires_at.is_some_and(|expires| now > expires) {
            return Err(CouponRejection::Expired);
        }
        if self
            .usage_limit
            .is_some_and(|limit| self.used_count >= limit)
        {
            return Err(CouponRejection::UsageLimitReached);
        }
        if subtotal < self.min_order_amount {
            return Err(CouponRejection::BelowMinimum {
                minimum: self.min_order_amount,
            });
        }
        Ok(())
    }

    /// Discount for `subtotal`, ignoring eligibility.
    ///
    /// Never negative and never more than the subtotal.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let raw = match self.kind {
            CouponKind::Percentage => {
                // Dividing first keeps the product within `subtotal`.
                let pct = subtotal / MAX_PERCENTAGE * self.value.min(MAX_PERCENTAGE);
                self.max_discount.map_or(pct, |cap| pct.min(cap))
            }
            CouponKind::Fixed => self.value,
        };

        round_dong(raw).clamp(Decimal::ZERO, subtotal)
    }
}

/// Flat-rate shipping with an optional free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub flat_fee: Decimal,
    /// Orders whose discounted subtotal reaches this amount ship free.
    pub free_threshold: Option<Decimal>,
}

impl ShippingPolicy {
    #[must_use]
    pub const fn flat(flat_fee: Decimal) -> Self {
        Self {
            flat_fee,
            free_threshold: None,
        }
    }

    /// Shipping fee for an order worth `discounted_subtotal`.
    #[must_use]
    pub fn fee_for(&self, discounted_subtotal: Decimal, has_items: bool) -> Decimal {
        if !has_items {
            return Decimal::ZERO;
        }
        match self.free_threshold {
            Some(threshold) if discounted_subtotal >= threshold => Decimal::ZERO,
            _ => self.flat_fee,
        }
    }
}

/// Money breakdown of a cart or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
}

impl Quote {
    /// Price `lines`, applying `coupon` if given.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::Coupon`] when a coupon is given but does not
    /// apply, and [`QuoteError::AmountTooLarge`] when the subtotal or total
    /// reaches [`AMOUNT_LIMIT`].
    pub fn compute(
        lines: &[PricedLine],
        coupon: Option<&CouponTerms>,
        shipping: &ShippingPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, QuoteError> {
        Self::price(lines, shipping, |subtotal| match coupon {
            Some(terms) => {
                terms.check(subtotal, now)?;
                Ok(terms.discount_for(subtotal))
            }
            None => Ok(Decimal::ZERO),
        })
    }

    /// Quote without coupon (cart view).
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::AmountTooLarge`] when the cart is worth
    /// [`AMOUNT_LIMIT`] or more.
    pub fn without_coupon(
        lines: &[PricedLine],
        shipping: &ShippingPolicy,
    ) -> Result<Self, QuoteError> {
        Self::price(lines, shipping, |_| Ok(Decimal::ZERO))
    }

    fn price(
        lines: &[PricedLine],
        shipping: &ShippingPolicy,
        discount_for: impl FnOnce(Decimal) -> Result<Decimal, CouponRejection>,
    ) -> Result<Self, QuoteError> {
        let subtotal = checked_subtotal(lines)
            .filter(|subtotal| *subtotal < AMOUNT_LIMIT)
            .ok_or(QuoteError::AmountTooLarge)?;
        let discount = discount_for(subtotal)?;

        let has_items = lines.iter().any(|line| line.quantity > 0);
        let shipping_fee = shipping.fee_for(subtotal - discount, has_items);
        let total = (subtotal - discount)
            .checked_add(shipping_fee)
            .filter(|total| *total < AMOUNT_LIMIT)
            .ok_or(QuoteError::AmountTooLarge)?
            .max(Decimal::ZERO);

        Ok(Self {
            subtotal,
            discount,
            shipping_fee,
            total,
        })
    }

    /// Rebuild the quote of a persisted order.
    ///
    /// Stored orders are never re-priced; this only re-attaches the figures
    /// that were saved when the order was placed.
    #[must_use]
    pub const fn from_stored(
        subtotal: Decimal,
        discount: Decimal,
        shipping_fee: Decimal,
        total: Decimal,
    ) -> Self {
        Self {
            subtotal,
            discount,
            shipping_fee,
            total,
        }
    }

    /// The same figures formatted as VND strings.
    #[must_use]
    pub fn formatted(&self) -> FormattedQuote {
        FormattedQuote {
            subtotal: format_vnd(self.subtotal),
            discount: format_vnd(self.discount),
            shipping_fee: format_vnd(self.shipping_fee),
            total: format_vnd(self.total),
        }
    }
}

/// Display strings for a [`Quote`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedQuote {
    pub subtotal: String,
    pub discount: String,
    pub shipping_fee: String,
    pub total: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn vnd(amount: i64) -> Decimal {
        Decimal::from(amount)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 9, 0, 0).unwrap()
    }

    fn percentage(value: i64) -> CouponTerms {
        CouponTerms {
            kind: CouponKind::Percentage,
            value: vnd(value),
            max_discount: None,
            min_order_amount: Decimal::ZERO,
            usage_limit: None,
            used_count: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }

    fn fixed(value: i64) -> CouponTerms {
        CouponTerms {
            kind: CouponKind::Fixed,
            value: vnd(value),
            ..percentage(1)
        }
    }

    fn shipping() -> ShippingPolicy {
        ShippingPolicy::flat(vnd(30_000))
    }

    fn cart() -> Vec<PricedLine> {
        vec![
            PricedLine::new(vnd(150_000), 2),
            PricedLine::new(vnd(45_000), 1),
        ]
    }

    #[test]
    fn test_quote_without_coupon() {
        let quote = Quote::compute(&cart(), None, &shipping(), now()).unwrap();
        assert_eq!(quote.subtotal, vnd(345_000));
        assert_eq!(quote.discount, Decimal::ZERO);
        assert_eq!(quote.shipping_fee, vnd(30_000));
        assert_eq!(quote.total, vnd(375_000));
        assert_eq!(quote, Quote::without_coupon(&cart(), &shipping()).unwrap());
    }

    #[test]
    fn test_percentage_discount() {
        let quote = Quote::compute(&cart(), Some(&percentage(10)), &shipping(), now()).unwrap();
        assert_eq!(quote.discount, vnd(34_500));
        assert_eq!(quote.total, vnd(345_000 - 34_500 + 30_000));
    }

    #[test]
    fn test_percentage_discount_is_capped() {
        let terms = CouponTerms {
            max_discount: Some(vnd(20_000)),
            ..percentage(10)
        };
        let quote = Quote::compute(&cart(), Some(&terms), &shipping(), now()).unwrap();
        assert_eq!(quote.discount, vnd(20_000));
    }

    #[test]
    fn test_percentage_discount_rounds_to_whole_dong() {
        let lines = [PricedLine::new(vnd(33_333), 1)];
        let quote = Quote::compute(&lines, Some(&percentage(15)), &shipping(), now()).unwrap();
        // 4999.95 -> 5000
        assert_eq!(quote.discount, vnd(5_000));
    }

    #[test]
    fn test_fixed_discount_never_exceeds_subtotal() {
        let lines = [PricedLine::new(vnd(40_000), 1)];
        let quote = Quote::compute(&lines, Some(&fixed(100_000)), &shipping(), now()).unwrap();
        assert_eq!(quote.discount, vnd(40_000));
        assert_eq!(quote.total, vnd(30_000));
    }

    #[test]
    fn test_below_minimum_is_rejected() {
        let terms = CouponTerms {
            min_order_amount: vnd(500_000),
            ..fixed(50_000)
        };
        let err = Quote::compute(&cart(), Some(&terms), &shipping(), now()).unwrap_err();
        assert_eq!(
            err,
            QuoteError::Coupon(CouponRejection::BelowMinimum {
                minimum: vnd(500_000)
            })
        );
        assert_eq!(
            err.to_string(),
            "coupon rejected: order subtotal must be at least 500.000 ₫"
        );
    }

    #[test]
    fn test_minimum_is_inclusive() {
        let terms = CouponTerms {
            min_order_amount: vnd(345_000),
            ..fixed(50_000)
        };
        assert!(Quote::compute(&cart(), Some(&terms), &shipping(), now()).is_ok());
    }

    #[test]
    fn test_usage_limit() {
        let mut terms = CouponTerms {
            usage_limit: Some(3),
            used_count: 2,
            ..fixed(10_000)
        };
        assert!(terms.check(vnd(100_000), now()).is_ok());
        terms.used_count = 3;
        assert_eq!(
            terms.check(vnd(100_000), now()),
            Err(CouponRejection::UsageLimitReached)
        );
    }

    #[test]
    fn test_date_window() {
        let not_yet = CouponTerms {
            starts_at: Some(now() + Duration::days(1)),
            ..fixed(10_000)
        };
        assert!(matches!(
            not_yet.check(vnd(100_000), now()),
            Err(CouponRejection::NotStarted { .. })
        ));

        let expired = CouponTerms {
            expires_at: Some(now() - Duration::seconds(1)),
            ..fixed(10_000)
        };
        assert_eq!(
            expired.check(vnd(100_000), now()),
            Err(CouponRejection::Expired)
        );

        let on_the_edge = CouponTerms {
            starts_at: Some(now()),
            expires_at: Some(now()),
            ..fixed(10_000)
        };
        assert!(on_the_edge.check(vnd(100_000), now()).is_ok());
    }

    #[test]
    fn test_rejection_order_inactive_first() {
        let terms = CouponTerms {
            is_active: false,
            expires_at: Some(now() - Duration::days(3)),
            min_order_amount: vnd(1_000_000),
            ..fixed(10_000)
        };
        assert_eq!(
            terms.check(vnd(1), now()),
            Err(CouponRejection::Inactive)
        );
    }

    #[test]
    fn test_free_shipping_threshold_uses_discounted_subtotal() {
        let policy = ShippingPolicy {
            flat_fee: vnd(30_000),
            free_threshold: Some(vnd(300_000)),
        };
        let quote = Quote::compute(&cart(), None, &policy, now()).unwrap();
        assert_eq!(quote.shipping_fee, Decimal::ZERO);

        let quote = Quote::compute(&cart(), Some(&fixed(50_000)), &policy, now()).unwrap();
        assert_eq!(quote.shipping_fee, vnd(30_000));
    }

    #[test]
    fn test_empty_order_has_no_shipping() {
        let quote = Quote::compute(&[], None, &shipping(), now()).unwrap();
        assert_eq!(quote.total, Decimal::ZERO);
    }

    #[test]
    fn test_formatted_quote() {
        let quote = Quote::from_stored(vnd(345_000), vnd(34_500), vnd(30_000), vnd(340_500));
        let formatted = quote.formatted();
        assert_eq!(formatted.subtotal, "345.000 ₫");
        assert_eq!(formatted.discount, "34.500 ₫");
        assert_eq!(formatted.shipping_fee, "30.000 ₫");
        assert_eq!(formatted.total, "340.500 ₫");
    }

    #[test]
    fn test_validate_terms() {
        assert!(percentage(100).validate().is_ok());
        assert_eq!(percentage(101).validate(), Err(TermsError::PercentageTooLarge));
        assert_eq!(fixed(0).validate(), Err(TermsError::NonPositiveValue));
        assert!(fixed(1_000_000).validate().is_ok());

        let window = CouponTerms {
            starts_at: Some(now()),
            expires_at: Some(now() - Duration::hours(1)),
            ..fixed(10_000)
        };
        assert_eq!(window.validate(), Err(TermsError::InvalidWindow));

        let limit = CouponTerms {
            usage_limit: Some(0),
            ..fixed(10_000)
        };
        assert_eq!(limit.validate(), Err(TermsError::InvalidUsageLimit));
    }

    #[test]
    fn test_amounts_past_the_limit_are_errors() {
        let huge = [PricedLine::new(Decimal::MAX, 1)];
        for terms in [percentage(10), fixed(1)] {
            assert_eq!(
                Quote::compute(&huge, Some(&terms), &shipping(), now()),
                Err(QuoteError::AmountTooLarge)
            );
        }
        assert_eq!(
            Quote::without_coupon(&huge, &shipping()),
            Err(QuoteError::AmountTooLarge)
        );

        let many = [PricedLine::new(Decimal::MAX, u32::MAX)];
        assert_eq!(many[0].line_total(), None);
        assert_eq!(
            Quote::compute(&many, None, &shipping(), now()),
            Err(QuoteError::AmountTooLarge)
        );
    }

    #[test]
    fn test_limit_applies_to_total_after_shipping() {
        let just_below = [PricedLine::new(AMOUNT_LIMIT - Decimal::ONE, 1)];
        assert_eq!(
            Quote::compute(&just_below, None, &shipping(), now()),
            Err(QuoteError::AmountTooLarge)
        );

        let free = ShippingPolicy {
            flat_fee: vnd(30_000),
            free_threshold: Some(vnd(1_000_000)),
        };
        let quote = Quote::compute(&just_below, Some(&percentage(100)), &free, now()).unwrap();
        assert_eq!(quote.total, vnd(30_000));
    }

    #[test]
    fn test_amount_limit_is_ten_trillion() {
        assert_eq!(AMOUNT_LIMIT, Decimal::from(10_000_000_000_000_i64));
    }

    #[test]
    fn test_rejection_codes_are_stable() {
        assert_eq!(CouponRejection::Expired.code(), "expired");
        assert_eq!(
            CouponRejection::BelowMinimum { minimum: vnd(1) }.code(),
            "below_minimum"
        );
        assert_eq!(QuoteError::AmountTooLarge.code(), "amount_too_large");
        assert_eq!(
            QuoteError::from(CouponRejection::Inactive).code(),
            "inactive"
        );
    }
}
