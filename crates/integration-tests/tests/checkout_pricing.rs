//! End-to-end pricing scenarios for checkout.
//!
//! These run without a server: they walk a cart through the same
//! `Quote` rules the API uses for the cart summary, coupon validation and
//! order placement.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use senmarket_core::{
    CouponKind, CouponRejection, CouponTerms, PricedLine, Quote, QuoteError, ShippingPolicy,
    format_vnd,
};

fn dong(amount: i64) -> Decimal {
    Decimal::from(amount)
}

fn shipping() -> ShippingPolicy {
    ShippingPolicy {
        flat_fee: dong(30_000),
        free_threshold: Some(dong(500_000)),
    }
}

fn coupon(kind: CouponKind, value: i64) -> CouponTerms {
    CouponTerms {
        kind,
        value: dong(value),
        max_discount: None,
        min_order_amount: Decimal::ZERO,
        usage_limit: None,
        used_count: 0,
        starts_at: None,
        expires_at: None,
        is_active: true,
    }
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 15, 9, 30, 0).unwrap()
}

/// Two shirts and a conical hat.
fn cart() -> Vec<PricedLine> {
    vec![
        PricedLine::new(dong(159_000), 2),
        PricedLine::new(dong(85_000), 1),
    ]
}

#[test]
fn test_cart_summary_without_coupon() {
    let quote = Quote::without_coupon(&cart(), &shipping()).unwrap();

    assert_eq!(quote.subtotal, dong(403_000));
    assert_eq!(quote.shipping_fee, dong(30_000));
    assert_eq!(quote.total, dong(433_000));
    assert_eq!(quote.formatted().total, "433.000 ₫");
}

#[test]
fn test_capped_percentage_coupon() {
    let mut terms = coupon(CouponKind::Percentage, 20);
    terms.max_discount = Some(dong(50_000));
    terms.min_order_amount = dong(200_000);

    let quote = Quote::compute(&cart(), Some(&terms), &shipping(), now()).unwrap();

    // 20% of 403.000 is 80.600, capped at 50.000
    assert_eq!(quote.discount, dong(50_000));
    assert_eq!(quote.shipping_fee, dong(30_000));
    assert_eq!(quote.total, dong(383_000));
}

#[test]
fn test_free_shipping_uses_discounted_subtotal() {
    let lines = vec![PricedLine::new(dong(520_000), 1)];

    let quote = Quote::compute(&lines, None, &shipping(), now()).unwrap();
    assert_eq!(quote.shipping_fee, Decimal::ZERO);
    assert_eq!(quote.total, dong(520_000));

    // A 30.000 voucher drops the order under the threshold
    let terms = coupon(CouponKind::Fixed, 30_000);
    let quote = Quote::compute(&lines, Some(&terms), &shipping(), now()).unwrap();
    assert_eq!(quote.discount, dong(30_000));
    assert_eq!(quote.shipping_fee, dong(30_000));
    assert_eq!(quote.total, dong(520_000));
}

#[test]
fn test_fixed_coupon_never_exceeds_subtotal() {
    let lines = vec![PricedLine::new(dong(85_000), 1)];
    let terms = coupon(CouponKind::Fixed, 100_000);

    let quote = Quote::compute(&lines, Some(&terms), &shipping(), now()).unwrap();

    assert_eq!(quote.discount, dong(85_000));
    assert_eq!(quote.total, dong(30_000));
}

#[test]
fn test_rejections_in_order() {
    let mut terms = coupon(CouponKind::Percentage, 10);
    terms.min_order_amount = dong(1_000_000);
    terms.usage_limit = Some(3);
    terms.used_count = 3;
    terms.expires_at = Some(now() - Duration::days(1));

    // Expiry is reported before the usage limit and the minimum
    assert_eq!(
        Quote::compute(&cart(), Some(&terms), &shipping(), now()),
        Err(QuoteError::Coupon(CouponRejection::Expired))
    );

    terms.expires_at = None;
    assert_eq!(
        Quote::compute(&cart(), Some(&terms), &shipping(), now()),
        Err(QuoteError::Coupon(CouponRejection::UsageLimitReached))
    );

    terms.used_count = 2;
    let rejection = Quote::compute(&cart(), Some(&terms), &shipping(), now()).unwrap_err();
    assert_eq!(rejection.code(), "below_minimum");
    assert_eq!(
        rejection.to_string(),
        format!(
            "coupon rejected: order subtotal must be at least {}",
            format_vnd(dong(1_000_000))
        )
    );
}

#[test]
fn test_stored_order_is_not_repriced() {
    let placed = Quote::compute(&cart(), None, &shipping(), now()).unwrap();

    let stored = Quote::from_stored(
        placed.subtotal,
        placed.discount,
        placed.shipping_fee,
        placed.total,
    );

    assert_eq!(stored, placed);
    assert_eq!(stored.formatted(), placed.formatted());
}

#[test]
fn test_empty_cart_ships_free() {
    let quote = Quote::without_coupon(&[], &shipping()).unwrap();
    assert_eq!(quote.total, Decimal::ZERO);
    assert_eq!(quote.formatted().shipping_fee, "0 ₫");
}
