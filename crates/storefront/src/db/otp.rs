//! One-time code repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use senmarket_core::{OtpCodeId, OtpPurpose};

use super::RepositoryError;
use crate::models::OtpCode;

#[derive(Debug, sqlx::FromRow)]
struct OtpRow {
    id: i32,
    email: String,
    purpose: OtpPurpose,
    code_hash: String,
    attempts: i32,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<OtpRow> for OtpCode {
    fn from(row: OtpRow) -> Self {
        Self {
            id: OtpCodeId::new(row.id),
            email: row.email,
            purpose: row.purpose,
            code_hash: row.code_hash,
            attempts: row.attempts,
            expires_at: row.expires_at,
            consumed_at: row.consumed_at,
            created_at: row.created_at,
        }
    }
}

/// Repository for one-time codes.
pub struct OtpRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OtpRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Issue a new code, retiring any open code for the same email and purpose.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn replace(
        &self,
        email: &str,
        purpose: OtpPurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<OtpCode, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            UPDATE shop.otp_code
            SET consumed_at = now()
            WHERE email = $1 AND purpose = $2 AND consumed_at IS NULL
            ",
        )
        .bind(email)
        .bind(purpose)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, OtpRow>(
            r"
            INSERT INTO shop.otp_code (email, purpose, code_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, purpose, code_hash, attempts, expires_at, consumed_at, created_at
            ",
        )
        .bind(email)
        .bind(purpose)
        .bind(code_hash)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// The most recent code for an email and purpose, redeemed or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest(
        &self,
        email: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpCode>, RepositoryError> {
        let row = sqlx::query_as::<_, OtpRow>(
            r"
            SELECT id, email, purpose, code_hash, attempts, expires_at, consumed_at, created_at
            FROM shop.otp_code
            WHERE email = $1 AND purpose = $2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(email)
        .bind(purpose)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Record a failed guess and return the new attempt count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the code does not exist.
    pub async fn record_failed_attempt(&self, id: OtpCodeId) -> Result<i32, RepositoryError> {
        let attempts: Option<i32> = sqlx::query_scalar(
            "UPDATE shop.otp_code SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        attempts.ok_or(RepositoryError::NotFound)
    }

    /// Mark a code as used. Returns `false` if it was already consumed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn consume(&self, id: OtpCodeId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.otp_code SET consumed_at = now() WHERE id = $1 AND consumed_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete codes that expired more than a day ago.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_stale(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM shop.otp_code WHERE expires_at < now() - INTERVAL '1 day'",
        )
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
