//! Order domain types.
//!
//! Money on an order is read back from the columns persisted at placement
//! time through [`Quote::from_stored`]; nothing here re-prices an order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use senmarket_core::{
    CouponId, FormattedQuote, OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, Quote,
    UserId, format_vnd,
};

/// A placed order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub recipient_name: String,
    pub phone: String,
    pub shipping_address: String,
    pub note: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub coupon_id: Option<CouponId>,
    pub coupon_code: Option<String>,
    #[serde(flatten)]
    pub quote: Quote,
    pub formatted: FormattedQuote,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of a placed order (name and price are snapshots).
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub line_total_formatted: String,
}

impl OrderItem {
    #[must_use]
    pub fn new(
        id: OrderItemId,
        product_id: Option<ProductId>,
        product_name: String,
        unit_price: Decimal,
        quantity: i32,
    ) -> Self {
        let line_total = unit_price * Decimal::from(quantity);
        Self {
            id,
            product_id,
            product_name,
            unit_price,
            quantity,
            line_total,
            line_total_formatted: format_vnd(line_total),
        }
    }
}

/// An order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Buyer account, filled in for admin views.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<OrderCustomer>,
}

/// Account that placed an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderCustomer {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// An order in a listing.
#[derive(Debug, Clone, Serialize)]
pub struct OrderListEntry {
    #[serde(flatten)]
    pub order: Order,
    pub item_count: i64,
    pub customer_name: String,
    pub customer_email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_item_line_total() {
        let item = OrderItem::new(
            OrderItemId::new(1),
            Some(ProductId::new(7)),
            "Nón lá".to_string(),
            Decimal::from(85_000),
            3,
        );
        assert_eq!(item.line_total, Decimal::from(255_000));
        assert_eq!(item.line_total_formatted, "255.000 ₫");
    }
}
