//! Review repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use senmarket_core::{OrderStatus, ProductId, ReviewId, UserId};

use super::{PageRequest, RepositoryError};
use crate::models::Review;

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.user_id, u.name AS author_name, r.product_id, p.name AS product_name,
           r.rating, r.comment, r.created_at, r.updated_at
    FROM shop.review r
    JOIN shop.user u ON u.id = r.user_id
    JOIN shop.product p ON p.id = r.product_id
";

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    user_id: i32,
    author_name: String,
    product_id: i32,
    product_name: String,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::new(row.id),
            user_id: UserId::new(row.user_id),
            author_name: row.author_name,
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for review operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of one product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        page: PageRequest,
    ) -> Result<(Vec<Review>, i64), RepositoryError> {
        self.list(Some(product_id), page).await
    }

    /// All reviews, optionally narrowed to one product. Newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        product_id: Option<ProductId>,
        page: PageRequest,
    ) -> Result<(Vec<Review>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.review WHERE ($1::int IS NULL OR product_id = $1)",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        let sql = format!(
            "{REVIEW_SELECT} WHERE ($1::int IS NULL OR r.product_id = $1) \
             ORDER BY r.created_at DESC, r.id DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(product_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let sql = format!("{REVIEW_SELECT} WHERE r.id = $1");
        let row = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Whether the user has a completed order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_completed_purchase(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM shop."order" o
                JOIN shop.order_item oi ON oi.order_id = o.id
                WHERE o.user_id = $1 AND oi.product_id = $2 AND o.status = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(OrderStatus::Completed)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO shop.review (user_id, product_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "review for this product"))?;

        self.get(ReviewId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Update a review owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist or is not the user's.
    pub async fn update(
        &self,
        user_id: UserId,
        id: ReviewId,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.review
            SET rating = $3, comment = $4, updated_at = now()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a review. `owner` restricts the delete to that user's review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no matching review exists.
    pub async fn delete(&self, id: ReviewId, owner: Option<UserId>) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM shop.review WHERE id = $1 AND ($2::int IS NULL OR user_id = $2)",
        )
        .bind(id)
        .bind(owner)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
