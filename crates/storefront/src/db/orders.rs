//! Order repository.
//!
//! Order money columns are written once, at placement, and read back through
//! [`Quote::from_stored`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use senmarket_core::{
    CouponId, OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, Quote, UserId,
};

use super::{PageRequest, RepositoryError, like_pattern};
use crate::models::{Order, OrderItem, OrderListEntry};

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.recipient_name, o.phone, o.shipping_address, \
    o.note, o.payment_method, o.status, o.coupon_id, o.coupon_code, o.subtotal, o.discount, \
    o.shipping_fee, o.total, o.created_at, o.updated_at";

/// Listing select: order, line count and buyer.
const ORDER_LIST_SELECT: &str = r#"
    SELECT o.id, o.user_id, o.recipient_name, o.phone, o.shipping_address, o.note,
           o.payment_method, o.status, o.coupon_id, o.coupon_code, o.subtotal, o.discount,
           o.shipping_fee, o.total, o.created_at, o.updated_at,
           (SELECT COALESCE(SUM(oi.quantity), 0) FROM shop.order_item oi WHERE oi.order_id = o.id)
               AS item_count,
           u.name AS customer_name, u.email AS customer_email
    FROM shop."order" o
    JOIN shop.user u ON u.id = o.user_id
"#;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    recipient_name: String,
    phone: String,
    shipping_address: String,
    note: Option<String>,
    payment_method: PaymentMethod,
    status: OrderStatus,
    coupon_id: Option<i32>,
    coupon_code: Option<String>,
    subtotal: Decimal,
    discount: Decimal,
    shipping_fee: Decimal,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        let quote = Quote::from_stored(row.subtotal, row.discount, row.shipping_fee, row.total);
        Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            recipient_name: row.recipient_name,
            phone: row.phone,
            shipping_address: row.shipping_address,
            note: row.note,
            payment_method: row.payment_method,
            status: row.status,
            coupon_id: row.coupon_id.map(CouponId::new),
            coupon_code: row.coupon_code,
            formatted: quote.formatted(),
            quote,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderListRow {
    #[sqlx(flatten)]
    order: OrderRow,
    item_count: i64,
    customer_name: String,
    customer_email: String,
}

impl From<OrderListRow> for OrderListEntry {
    fn from(row: OrderListRow) -> Self {
        Self {
            order: row.order.into(),
            item_count: row.item_count,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    product_id: Option<i32>,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self::new(
            OrderItemId::new(row.id),
            row.product_id.map(ProductId::new),
            row.product_name,
            row.unit_price,
            row.quantity,
        )
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// A priced order ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: UserId,
    pub recipient_name: &'a str,
    pub phone: &'a str,
    pub shipping_address: &'a str,
    pub note: Option<&'a str>,
    pub payment_method: PaymentMethod,
    pub coupon_id: Option<CouponId>,
    pub coupon_code: Option<&'a str>,
    pub quote: Quote,
}

/// Admin order listing filters.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Order number, recipient, phone or buyer email.
    pub search: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<(Vec<OrderListEntry>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM shop."order" WHERE user_id = $1 AND ($2::shop.order_status IS NULL OR status = $2)"#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        let sql = format!(
            "{ORDER_LIST_SELECT} WHERE o.user_id = $1 AND ($2::shop.order_status IS NULL OR o.status = $2) \
             ORDER BY o.created_at DESC, o.id DESC LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, OrderListRow>(&sql)
            .bind(user_id)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Any order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(r#"SELECT {ORDER_COLUMNS} FROM shop."order" o WHERE o.id = $1"#);
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// An order, only if it belongs to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            r#"SELECT {ORDER_COLUMNS} FROM shop."order" o WHERE o.id = $1 AND o.user_id = $2"#
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Lines of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, product_id, product_name, unit_price, quantity
            FROM shop.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Admin listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<OrderListEntry>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(
            r#"SELECT COUNT(*) FROM shop."order" o JOIN shop.user u ON u.id = o.user_id WHERE TRUE"#,
        );
        push_order_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(ORDER_LIST_SELECT);
        query.push(" WHERE TRUE");
        push_order_filters(&mut query, filter);
        query
            .push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query
            .build_query_as::<OrderListRow>()
            .fetch_all(self.pool)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Every order matching `filter`, newest first, for spreadsheet export.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn export(&self, filter: &OrderFilter) -> Result<Vec<OrderListEntry>, RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new(ORDER_LIST_SELECT);
        query.push(" WHERE TRUE");
        push_order_filters(&mut query, filter);
        query.push(" ORDER BY o.created_at DESC, o.id DESC");

        let rows = query
            .build_query_as::<OrderListRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete an order and its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query(r#"DELETE FROM shop."order" WHERE id = $1"#)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Transactional helpers
    // =========================================================================

    /// Lock an order row for a status change.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_in(
        conn: &mut PgConnection,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(r#"SELECT {ORDER_COLUMNS} FROM shop."order" o WHERE o.id = $1 FOR UPDATE"#);
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Insert the order header.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_in(
        conn: &mut PgConnection,
        new: &NewOrder<'_>,
    ) -> Result<OrderId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO shop."order"
                (user_id, recipient_name, phone, shipping_address, note, payment_method,
                 coupon_id, coupon_code, subtotal, discount, shipping_fee, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(new.user_id)
        .bind(new.recipient_name)
        .bind(new.phone)
        .bind(new.shipping_address)
        .bind(new.note)
        .bind(new.payment_method)
        .bind(new.coupon_id)
        .bind(new.coupon_code)
        .bind(new.quote.subtotal)
        .bind(new.quote.discount)
        .bind(new.quote.shipping_fee)
        .bind(new.quote.total)
        .fetch_one(conn)
        .await?;

        Ok(OrderId::new(id))
    }

    /// Insert one order line with its name and price snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_item_in(
        conn: &mut PgConnection,
        order_id: OrderId,
        product_id: ProductId,
        product_name: &str,
        unit_price: Decimal,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.order_item (order_id, product_id, product_name, unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(order_id)
        .bind(product_id)
        .bind(product_name)
        .bind(unit_price)
        .bind(quantity)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// `(product_id, quantity)` of every line that still references a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stock_lines_in(
        conn: &mut PgConnection,
        id: OrderId,
    ) -> Result<Vec<(ProductId, i32)>, RepositoryError> {
        let rows: Vec<(i32, i32)> = sqlx::query_as(
            r"
            SELECT product_id, quantity
            FROM shop.order_item
            WHERE order_id = $1 AND product_id IS NOT NULL
            ORDER BY product_id
            ",
        )
        .bind(id)
        .fetch_all(conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, quantity)| (ProductId::new(product_id), quantity))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_status_in(
        conn: &mut PgConnection,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query(r#"UPDATE shop."order" SET status = $2, updated_at = now() WHERE id = $1"#)
            .bind(id)
            .bind(status)
            .execute(conn)
            .await?;
        Ok(())
    }
}

fn push_order_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    if let Some(status) = filter.status {
        query.push(" AND o.status = ").push_bind(status);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        query.push(" AND (o.recipient_name ILIKE ").push_bind(pattern.clone());
        query.push(" OR o.phone ILIKE ").push_bind(pattern.clone());
        query.push(" OR u.email ILIKE ").push_bind(pattern);
        if let Ok(id) = search.trim_start_matches('#').parse::<i32>() {
            query.push(" OR o.id = ").push_bind(id);
        }
        query.push(")");
    }
}
