//! Aggregate queries for the admin dashboard.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use senmarket_core::{OrderStatus, ProductId, format_vnd};

use super::RepositoryError;

/// Headline counts.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DashboardTotals {
    pub users: i64,
    pub products: i64,
    pub orders: i64,
    /// Sum of `total` over completed orders.
    pub revenue: Decimal,
}

/// Number of orders in one status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub label: &'static str,
    pub count: i64,
}

/// A best-selling product over non-cancelled orders.
#[derive(Debug, Clone, Serialize)]
pub struct TopProduct {
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity_sold: i64,
    pub revenue: Decimal,
    pub revenue_formatted: String,
}

#[derive(Debug, sqlx::FromRow)]
struct TopProductRow {
    product_id: Option<i32>,
    product_name: String,
    quantity_sold: i64,
    revenue: Decimal,
}

/// Repository for dashboard statistics.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn totals(&self) -> Result<DashboardTotals, RepositoryError> {
        let totals = sqlx::query_as::<_, DashboardTotals>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM shop.user) AS users,
                (SELECT COUNT(*) FROM shop.product) AS products,
                (SELECT COUNT(*) FROM shop."order") AS orders,
                (SELECT COALESCE(SUM(total), 0) FROM shop."order" WHERE status = $1) AS revenue
            "#,
        )
        .bind(OrderStatus::Completed)
        .fetch_one(self.pool)
        .await?;

        Ok(totals)
    }

    /// Order count for every status, including empty ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orders_by_status(&self) -> Result<Vec<StatusCount>, RepositoryError> {
        let rows: Vec<(OrderStatus, i64)> = sqlx::query_as(
            r#"SELECT status, COUNT(*) FROM shop."order" GROUP BY status"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(OrderStatus::ALL
            .iter()
            .map(|&status| StatusCount {
                status,
                label: status.label_vi(),
                count: rows
                    .iter()
                    .find(|(s, _)| *s == status)
                    .map_or(0, |(_, count)| *count),
            })
            .collect())
    }

    /// Best sellers by quantity, cancelled orders excluded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(&self, limit: i64) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, TopProductRow>(
            r#"
            SELECT oi.product_id,
                   MAX(oi.product_name) AS product_name,
                   SUM(oi.quantity)::bigint AS quantity_sold,
                   SUM(oi.unit_price * oi.quantity) AS revenue
            FROM shop.order_item oi
            JOIN shop."order" o ON o.id = oi.order_id
            WHERE o.status <> $1
            GROUP BY oi.product_id
            ORDER BY quantity_sold DESC, revenue DESC
            LIMIT $2
            "#,
        )
        .bind(OrderStatus::Cancelled)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TopProduct {
                product_id: row.product_id.map(ProductId::new),
                product_name: row.product_name,
                quantity_sold: row.quantity_sold,
                revenue_formatted: format_vnd(row.revenue),
                revenue: row.revenue,
            })
            .collect())
    }
}
