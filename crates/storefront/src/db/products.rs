//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use senmarket_core::{CategoryId, ProductId, format_vnd};

use super::{PageRequest, RepositoryError, like_pattern};
use crate::models::{Product, ProductFilter, ProductInput};

/// Product columns plus category name and rating summary.
const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.category_id, c.name AS category_name, p.name, p.slug, p.description,
           p.price, p.sale_price, p.effective_price, p.stock, p.image_url, p.is_active, p.created_at, p.updated_at,
           r.average_rating, COALESCE(r.review_count, 0) AS review_count
    FROM shop.product p
    LEFT JOIN shop.category c ON c.id = p.category_id
    LEFT JOIN (
        SELECT product_id, ROUND(AVG(rating), 1) AS average_rating, COUNT(*) AS review_count
        FROM shop.review
        GROUP BY product_id
    ) r ON r.product_id = p.id
";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    category_id: Option<i32>,
    category_name: Option<String>,
    name: String,
    slug: String,
    description: Option<String>,
    price: Decimal,
    sale_price: Option<Decimal>,
    effective_price: Decimal,
    stock: i32,
    image_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    average_rating: Option<Decimal>,
    review_count: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            category_id: row.category_id.map(CategoryId::new),
            category_name: row.category_name,
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            sale_price: row.sale_price,
            effective_price: row.effective_price,
            effective_price_formatted: format_vnd(row.effective_price),
            stock: row.stock,
            image_url: row.image_url,
            is_active: row.is_active,
            average_rating: row.average_rating,
            review_count: row.review_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A product row locked for the duration of an order transaction.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedProduct {
    pub id: ProductId,
    pub name: String,
    /// Effective unit price.
    pub unit_price: Decimal,
    pub stock: i32,
    pub is_active: bool,
}

/// Repository for product operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Filtered, sorted, paginated listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM shop.product p LEFT JOIN shop.category c ON c.id = p.category_id WHERE TRUE",
        );
        push_product_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(PRODUCT_SELECT);
        query.push(" WHERE TRUE");
        push_product_filters(&mut query, filter);
        query
            .push(" ORDER BY ")
            .push(filter.sort.order_by())
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Get a product. Hidden products are only returned when `include_inactive`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: ProductId,
        include_inactive: bool,
    ) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1 AND (p.is_active OR $2)");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(include_inactive)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Other active products of the same category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related(
        &self,
        product: &Product,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let Some(category_id) = product.category_id else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "{PRODUCT_SELECT} WHERE p.category_id = $1 AND p.id <> $2 AND p.is_active \
             ORDER BY p.created_at DESC, p.id DESC LIMIT $3"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(category_id)
            .bind(product.id)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Newest active products, in-stock first, for the assistant's context.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn catalog_snapshot(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "{PRODUCT_SELECT} WHERE p.is_active ORDER BY (p.stock > 0) DESC, p.created_at DESC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &ProductInput, slug: &str) -> Result<Product, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO shop.product
                (category_id, name, slug, description, price, sale_price, stock, image_url, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(slug)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.sale_price)
        .bind(input.stock)
        .bind(input.image_url.as_deref())
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "product"))?;

        self.get(ProductId::new(id), true)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
        slug: &str,
    ) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.product
            SET category_id = $2, name = $3, slug = $4, description = $5, price = $6,
                sale_price = $7, stock = $8, image_url = $9, is_active = $10, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(slug)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.sale_price)
        .bind(input.stock)
        .bind(input.image_url.as_deref())
        .bind(input.is_active)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "product"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get(id, true).await?.ok_or(RepositoryError::NotFound)
    }

    /// Flip the `is_active` flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn toggle_active(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.product SET is_active = NOT is_active, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get(id, true).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product. Order lines keep their name and price snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

impl ProductRepository<'_> {
    /// Lock the given products (`FOR UPDATE`, ordered by id).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_in(
        conn: &mut PgConnection,
        ids: &[ProductId],
    ) -> Result<Vec<LockedProduct>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, LockedProduct>(
            r"
            SELECT id, name, effective_price AS unit_price, stock, is_active
            FROM shop.product
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(ids)
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }

    /// Add `delta` (negative to take) to a product's stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if stock would go negative.
    pub async fn adjust_stock_in(
        conn: &mut PgConnection,
        id: ProductId,
        delta: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.product SET stock = stock + $2, updated_at = now() WHERE id = $1 AND stock + $2 >= 0",
        )
        .bind(id)
        .bind(delta)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "insufficient stock for product {id}"
            )));
        }
        Ok(())
    }
}

fn push_product_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if !filter.include_inactive {
        query.push(" AND p.is_active");
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        query
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = filter.category.as_deref().filter(|s| !s.is_empty()) {
        query.push(" AND c.slug = ").push_bind(category.to_string());
    }
    if let Some(min) = filter.min_price {
        query
            .push(" AND p.effective_price >= ")
            .push_bind(min);
    }
    if let Some(max) = filter.max_price {
        query
            .push(" AND p.effective_price <= ")
            .push_bind(max);
    }
}
