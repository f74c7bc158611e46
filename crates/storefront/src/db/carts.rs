//! Cart repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use senmarket_core::{CartItemId, ProductId, UserId};

use super::RepositoryError;
use crate::models::{CartLine, Product};

const CART_SELECT: &str = r"
    SELECT ci.id, ci.product_id, p.name AS product_name, p.slug AS product_slug, p.image_url,
           p.effective_price AS unit_price, p.stock, p.is_active, ci.quantity,
           ci.created_at, ci.updated_at
    FROM shop.cart_item ci
    JOIN shop.product p ON p.id = ci.product_id
";

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i32,
    product_id: i32,
    product_name: String,
    product_slug: String,
    image_url: Option<String>,
    unit_price: Decimal,
    stock: i32,
    is_active: bool,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for CartLine {
    fn from(row: CartRow) -> Self {
        Self {
            id: CartItemId::new(row.id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            product_slug: row.product_slug,
            image_url: row.image_url,
            unit_price: row.unit_price,
            stock: row.stock,
            is_active: row.is_active,
            quantity: row.quantity,
            line_total: row.unit_price * Decimal::from(row.quantity),
            available: CartLine::is_purchasable(row.is_active, row.stock, row.quantity),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for cart operations. Every method is scoped to one user.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All lines of a user's cart, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let sql = format!("{CART_SELECT} WHERE ci.user_id = $1 ORDER BY ci.created_at, ci.id");
        let rows = sqlx::query_as::<_, CartRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// A single line of a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: CartItemId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let sql = format!("{CART_SELECT} WHERE ci.user_id = $1 AND ci.id = $2");
        let row = sqlx::query_as::<_, CartRow>(&sql)
            .bind(user_id)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Current quantity of a product in the cart (0 if absent).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<i32, RepositoryError> {
        let quantity: Option<i32> = sqlx::query_scalar(
            "SELECT quantity FROM shop.cart_item WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    /// Add `quantity` units of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product: &Product,
        quantity: i32,
    ) -> Result<CartLine, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO shop.cart_item (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = shop.cart_item.quantity + EXCLUDED.quantity, updated_at = now()
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(product.id)
        .bind(quantity)
        .fetch_one(self.pool)
        .await?;

        self.get(user_id, CartItemId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Set the quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this user's cart.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<CartLine, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.cart_item SET quantity = $3, updated_at = now() WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get(user_id, id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this user's cart.
    pub async fn remove(&self, user_id: UserId, id: CartItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Transactional helpers
    // =========================================================================

    /// `(product_id, quantity)` of every line, ordered by product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines_in(
        conn: &mut PgConnection,
        user_id: UserId,
    ) -> Result<Vec<(ProductId, i32)>, RepositoryError> {
        let rows: Vec<(i32, i32)> = sqlx::query_as(
            "SELECT product_id, quantity FROM shop.cart_item WHERE user_id = $1 ORDER BY product_id",
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, quantity)| (ProductId::new(product_id), quantity))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear_in(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(conn)
            .await?;
        Ok(())
    }
}
