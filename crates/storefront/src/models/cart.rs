//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use senmarket_core::{
    CartItemId, FormattedQuote, PricedLine, ProductId, Quote, QuoteError, ShippingPolicy,
};

/// A cart line joined with the current state of its product.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub image_url: Option<String>,
    /// Effective unit price at the time of reading.
    pub unit_price: Decimal,
    pub stock: i32,
    pub is_active: bool,
    pub quantity: i32,
    pub line_total: Decimal,
    /// Active and in stock for the requested quantity. Unavailable lines are
    /// left out of the quote and would be refused at checkout.
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    #[must_use]
    pub const fn is_purchasable(is_active: bool, stock: i32, quantity: i32) -> bool {
        is_active && quantity <= stock
    }

    #[must_use]
    pub fn priced(&self) -> PricedLine {
        PricedLine::new(
            self.unit_price,
            u32::try_from(self.quantity).unwrap_or_default(),
        )
    }
}

/// Priced lines for everything in `items` that can be bought right now.
#[must_use]
pub fn purchasable_lines(items: &[CartLine]) -> Vec<PricedLine> {
    items
        .iter()
        .filter(|item| item.available)
        .map(CartLine::priced)
        .collect()
}

/// The cart with its price summary.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub item_count: i64,
    pub has_unavailable_items: bool,
    #[serde(flatten)]
    pub quote: Quote,
    pub formatted: FormattedQuote,
}

impl CartView {
    /// Price the purchasable lines of `items`.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError::AmountTooLarge` if the cart is worth more than
    /// an order can hold.
    pub fn new(items: Vec<CartLine>, shipping: &ShippingPolicy) -> Result<Self, QuoteError> {
        let quote = Quote::without_coupon(&purchasable_lines(&items), shipping)?;
        let item_count = items.iter().map(|item| i64::from(item.quantity)).sum();

        Ok(Self {
            has_unavailable_items: items.iter().any(|item| !item.available),
            items,
            item_count,
            formatted: quote.formatted(),
            quote,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, price: i64, quantity: i32) -> CartLine {
        let now = Utc::now();
        CartLine {
            id: CartItemId::new(id),
            product_id: ProductId::new(id),
            product_name: format!("Sản phẩm {id}"),
            product_slug: format!("san-pham-{id}"),
            image_url: None,
            unit_price: Decimal::from(price),
            stock: 10,
            is_active: true,
            quantity,
            line_total: Decimal::from(price) * Decimal::from(quantity),
            available: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cart_view_totals() {
        let shipping = ShippingPolicy::flat(Decimal::from(30_000));
        let view =
            CartView::new(vec![line(1, 120_000, 2), line(2, 60_000, 1)], &shipping).unwrap();

        assert_eq!(view.item_count, 3);
        assert!(!view.has_unavailable_items);
        assert_eq!(view.quote.subtotal, Decimal::from(300_000));
        assert_eq!(view.quote.total, Decimal::from(330_000));
        assert_eq!(view.formatted.total, "330.000 ₫");
    }

    #[test]
    fn test_empty_cart_is_free() {
        let shipping = ShippingPolicy::flat(Decimal::from(30_000));
        let view = CartView::new(vec![], &shipping).unwrap();
        assert_eq!(view.quote.total, Decimal::ZERO);
        assert_eq!(view.item_count, 0);
    }

    #[test]
    fn test_unavailable_lines_are_flagged_and_not_priced() {
        let shipping = ShippingPolicy::flat(Decimal::from(30_000));
        let mut hidden = line(2, 500_000, 1);
        hidden.available = false;

        let view = CartView::new(vec![line(1, 120_000, 2), hidden], &shipping).unwrap();
        assert!(view.has_unavailable_items);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.quote.subtotal, Decimal::from(240_000));
        assert_eq!(view.quote.total, Decimal::from(270_000));
    }

    #[test]
    fn test_purchasable_rule() {
        assert!(CartLine::is_purchasable(true, 5, 5));
        assert!(!CartLine::is_purchasable(true, 4, 5));
        assert!(!CartLine::is_purchasable(false, 10, 1));
    }
}
