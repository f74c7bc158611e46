//! Order placement and status changes.
//!
//! Every write here runs in one transaction. Placement locks the products and
//! the coupon before pricing, so stock and coupon usage cannot be oversold by
//! concurrent checkouts.

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;

use senmarket_core::{
    OrderId, OrderStatus, PaymentMethod, PricedLine, ProductId, Quote, QuoteError,
    ShippingPolicy, UserId,
};

use crate::db::RepositoryError;
use crate::db::carts::CartRepository;
use crate::db::coupons::CouponRepository;
use crate::db::orders::{NewOrder, OrderRepository};
use crate::db::products::{LockedProduct, ProductRepository};
use crate::models::{Order, OrderDetail, normalize_code};

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("cart is empty")]
    EmptyCart,

    /// Product deleted or hidden since it was added to the cart.
    #[error("product {product_id} is no longer available")]
    ProductUnavailable { product_id: ProductId },

    #[error("only {available} of \"{name}\" left in stock")]
    InsufficientStock { name: String, available: i32 },

    #[error("coupon not found")]
    CouponNotFound,

    #[error(transparent)]
    Pricing(#[from] QuoteError),

    #[error("order not found")]
    NotFound,

    #[error("cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Customers may only cancel orders that are still pending.
    #[error("order can no longer be cancelled")]
    NotCancellable,

    /// Only completed or cancelled orders may be deleted.
    #[error("only completed or cancelled orders can be deleted")]
    NotDeletable,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Checkout form after field validation.
#[derive(Debug, Clone)]
pub struct Checkout<'a> {
    pub recipient_name: &'a str,
    pub phone: &'a str,
    pub shipping_address: &'a str,
    pub note: Option<&'a str>,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<&'a str>,
}

/// A cart line matched against its locked product.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedLine {
    product_id: ProductId,
    name: String,
    unit_price: rust_decimal::Decimal,
    quantity: i32,
}

impl PlannedLine {
    fn priced(&self) -> PricedLine {
        PricedLine::new(self.unit_price, self.quantity.unsigned_abs())
    }
}

/// Order workflows.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    shipping: &'a ShippingPolicy,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, shipping: &'a ShippingPolicy) -> Self {
        Self { pool, shipping }
    }

    /// Turn the user's cart into an order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::EmptyCart`, `ProductUnavailable` or
    /// `InsufficientStock` when the cart cannot be fulfilled, and
    /// `CouponNotFound` / `Pricing` when the code cannot be applied or the
    /// order is too large to store.
    pub async fn place(&self, user_id: UserId, checkout: &Checkout<'_>) -> Result<OrderDetail, OrderError> {
        let mut tx = self.pool.begin().await?;

        let cart = CartRepository::lines_in(&mut tx, user_id).await?;
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let ids: Vec<ProductId> = cart.iter().map(|(id, _)| *id).collect();
        let locked = ProductRepository::lock_in(&mut tx, &ids).await?;
        let lines = plan_lines(&cart, &locked)?;
        let priced: Vec<PricedLine> = lines.iter().map(PlannedLine::priced).collect();

        let code = checkout
            .coupon_code
            .map(normalize_code)
            .filter(|c| !c.is_empty());
        let coupon = match code.as_deref() {
            Some(code) => Some(
                CouponRepository::lock_by_code_in(&mut tx, code)
                    .await?
                    .ok_or(OrderError::CouponNotFound)?,
            ),
            None => None,
        };

        let quote = Quote::compute(
            &priced,
            coupon.as_ref().map(|c| &c.terms),
            self.shipping,
            Utc::now(),
        )?;

        let order_id = OrderRepository::insert_in(
            &mut tx,
            &NewOrder {
                user_id,
                recipient_name: checkout.recipient_name,
                phone: checkout.phone,
                shipping_address: checkout.shipping_address,
                note: checkout.note,
                payment_method: checkout.payment_method,
                coupon_id: coupon.as_ref().map(|c| c.id),
                coupon_code: coupon.as_ref().map(|c| c.code.as_str()),
                quote,
            },
        )
        .await?;

        for line in &lines {
            OrderRepository::insert_item_in(
                &mut tx,
                order_id,
                line.product_id,
                &line.name,
                line.unit_price,
                line.quantity,
            )
            .await?;
            ProductRepository::adjust_stock_in(&mut tx, line.product_id, -line.quantity).await?;
        }

        if let Some(coupon) = &coupon {
            CouponRepository::record_use_in(&mut tx, coupon.id).await?;
        }
        CartRepository::clear_in(&mut tx, user_id).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            user_id = %user_id,
            total = %quote.total,
            coupon = ?code,
            "Order placed"
        );

        self.detail(order_id).await
    }

    /// Cancel a pending order on behalf of its owner.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for unknown or foreign orders and
    /// `OrderError::NotCancellable` once the order left `pending`.
    pub async fn cancel_by_customer(&self, user_id: UserId, id: OrderId) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = OrderRepository::lock_in(&mut tx, id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(OrderError::NotFound)?;
        if !order.status.is_cancellable_by_customer() {
            return Err(OrderError::NotCancellable);
        }

        apply_transition(&mut tx, &order, OrderStatus::Cancelled).await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, user_id = %user_id, "Order cancelled by customer");
        self.order(id).await
    }

    /// Move an order to a new status (admin).
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` if the status graph forbids the move.
    pub async fn change_status(&self, id: OrderId, next: OrderStatus) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = OrderRepository::lock_in(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        if !order.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }

        apply_transition(&mut tx, &order, next).await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, from = %order.status, to = %next, "Order status changed");
        self.order(id).await
    }

    /// Delete a finished order (admin).
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotDeletable` for orders still in progress.
    pub async fn delete(&self, id: OrderId) -> Result<(), OrderError> {
        let orders = OrderRepository::new(self.pool);
        let order = orders.get(id).await?.ok_or(OrderError::NotFound)?;
        if !order.status.is_terminal() {
            return Err(OrderError::NotDeletable);
        }
        orders.delete(id).await?;
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Order, OrderError> {
        OrderRepository::new(self.pool)
            .get(id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    async fn detail(&self, id: OrderId) -> Result<OrderDetail, OrderError> {
        let orders = OrderRepository::new(self.pool);
        let order = orders.get(id).await?.ok_or(OrderError::NotFound)?;
        let items = orders.items(id).await?;
        Ok(OrderDetail {
            order,
            items,
            customer: None,
        })
    }
}

/// Set the status, giving back stock and coupon usage on cancellation.
async fn apply_transition(
    conn: &mut sqlx::PgConnection,
    order: &Order,
    next: OrderStatus,
) -> Result<(), OrderError> {
    if next.releases_stock() {
        for (product_id, quantity) in OrderRepository::stock_lines_in(conn, order.id).await? {
            ProductRepository::adjust_stock_in(conn, product_id, quantity).await?;
        }
        if let Some(coupon_id) = order.coupon_id {
            CouponRepository::release_use_in(conn, coupon_id).await?;
        }
    }
    OrderRepository::set_status_in(conn, order.id, next).await?;
    Ok(())
}

/// Match cart lines to locked products, checking availability and stock.
fn plan_lines(
    cart: &[(ProductId, i32)],
    locked: &[LockedProduct],
) -> Result<Vec<PlannedLine>, OrderError> {
    cart.iter()
        .map(|&(product_id, quantity)| {
            let product = locked
                .iter()
                .find(|p| p.id == product_id)
                .filter(|p| p.is_active)
                .ok_or(OrderError::ProductUnavailable { product_id })?;
            if product.stock < quantity {
                return Err(OrderError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock,
                });
            }
            Ok(PlannedLine {
                product_id,
                name: product.name.clone(),
                unit_price: product.unit_price,
                quantity,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: i32, price: i64, stock: i32, is_active: bool) -> LockedProduct {
        LockedProduct {
            id: ProductId::new(id),
            name: format!("Sản phẩm {id}"),
            unit_price: Decimal::from(price),
            stock,
            is_active,
        }
    }

    #[test]
    fn test_plan_lines_matches_products() {
        let cart = [(ProductId::new(1), 2), (ProductId::new(3), 1)];
        let locked = [product(1, 150_000, 5, true), product(3, 90_000, 1, true)];

        let lines = plan_lines(&cart, &locked).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].unit_price, Decimal::from(150_000));
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[1].name, "Sản phẩm 3");

        let subtotal: Decimal = lines.iter().filter_map(|l| l.priced().line_total()).sum();
        assert_eq!(subtotal, Decimal::from(390_000));
    }

    #[test]
    fn test_plan_lines_rejects_hidden_or_missing_products() {
        let cart = [(ProductId::new(1), 1)];
        assert!(matches!(
            plan_lines(&cart, &[product(1, 10_000, 5, false)]),
            Err(OrderError::ProductUnavailable { product_id }) if product_id == ProductId::new(1)
        ));
        assert!(matches!(
            plan_lines(&cart, &[]),
            Err(OrderError::ProductUnavailable { .. })
        ));
    }

    #[test]
    fn test_plan_lines_rejects_short_stock() {
        let cart = [(ProductId::new(2), 4)];
        let err = plan_lines(&cart, &[product(2, 10_000, 3, true)]).unwrap_err();
        match err {
            OrderError::InsufficientStock { available, .. } => assert_eq!(available, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_plan_lines_allows_exact_stock() {
        let cart = [(ProductId::new(2), 3)];
        assert!(plan_lines(&cart, &[product(2, 10_000, 3, true)]).is_ok());
    }
}
