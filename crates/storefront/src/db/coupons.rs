//! Coupon repository.
//!
//! Usage counters are only changed inside an order transaction, through the
//! `*_in` functions that take an open connection.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use senmarket_core::{CouponId, CouponKind, CouponTerms};

use super::{PageRequest, RepositoryError};
use crate::models::{Coupon, CouponInput};

const COUPON_COLUMNS: &str = "id, code, kind, value, max_discount, min_order_amount, usage_limit, \
    used_count, starts_at, expires_at, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: i32,
    code: String,
    kind: CouponKind,
    value: Decimal,
    max_discount: Option<Decimal>,
    min_order_amount: Decimal,
    usage_limit: Option<i32>,
    used_count: i32,
    starts_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Self {
            id: CouponId::new(row.id),
            code: row.code,
            terms: CouponTerms {
                kind: row.kind,
                value: row.value,
                max_discount: row.max_discount,
                min_order_amount: row.min_order_amount,
                usage_limit: row.usage_limit,
                used_count: row.used_count,
                starts_at: row.starts_at,
                expires_at: row.expires_at,
                is_active: row.is_active,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for coupon operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a coupon by its normalized code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM shop.coupon WHERE code = $1");
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(code)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM shop.coupon WHERE id = $1");
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<Coupon>, i64), RepositoryError> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| super::like_pattern(&s.to_uppercase()));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.coupon WHERE ($1::text IS NULL OR code LIKE $1)",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let sql = format!(
            "SELECT {COUPON_COLUMNS} FROM shop.coupon WHERE ($1::text IS NULL OR code LIKE $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(pattern.as_deref())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create(&self, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO shop.coupon
                (code, kind, value, max_discount, min_order_amount, usage_limit,
                 starts_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COUPON_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(input.normalized_code())
            .bind(input.kind)
            .bind(input.value)
            .bind(input.max_discount)
            .bind(input.min_order_amount)
            .bind(input.usage_limit)
            .bind(input.starts_at)
            .bind(input.expires_at)
            .bind(input.is_active)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "coupon code"))?;

        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn update(&self, id: CouponId, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        let sql = format!(
            r"
            UPDATE shop.coupon
            SET code = $2, kind = $3, value = $4, max_discount = $5, min_order_amount = $6,
                usage_limit = $7, starts_at = $8, expires_at = $9, is_active = $10,
                updated_at = now()
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(id)
            .bind(input.normalized_code())
            .bind(input.kind)
            .bind(input.value)
            .bind(input.max_discount)
            .bind(input.min_order_amount)
            .bind(input.usage_limit)
            .bind(input.starts_at)
            .bind(input.expires_at)
            .bind(input.is_active)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "coupon code"))?
            .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Flip the `is_active` flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn toggle_active(&self, id: CouponId) -> Result<Coupon, RepositoryError> {
        let sql = format!(
            "UPDATE shop.coupon SET is_active = NOT is_active, updated_at = now() \
             WHERE id = $1 RETURNING {COUPON_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a coupon. Orders keep the code they were placed with.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.coupon WHERE id = $1")
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

    /// Lock a coupon row for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_by_code_in(
        conn: &mut PgConnection,
        code: &str,
    ) -> Result<Option<Coupon>, RepositoryError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM shop.coupon WHERE code = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(code)
            .fetch_optional(conn)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Count one use of a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn record_use_in(conn: &mut PgConnection, id: CouponId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE shop.coupon SET used_count = used_count + 1 WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Give back one use of a coupon (cancelled order). Never goes below zero.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn release_use_in(conn: &mut PgConnection, id: CouponId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE shop.coupon SET used_count = GREATEST(used_count - 1, 0) WHERE id = $1",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }
}
