//! API access token repository.
//!
//! Only the SHA-256 hex digest of a token is stored; the raw value is shown
//! to the client once at issue time.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use senmarket_core::{AccessTokenId, UserId};

use super::RepositoryError;
use crate::models::User;

/// Repository for bearer token operations.
pub struct AccessTokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AccessTokenRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a newly issued token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        token_hash: &str,
        name: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessTokenId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO shop.access_token (user_id, token_hash, name, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(name)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;

        Ok(AccessTokenId::new(id))
    }

    /// Resolve an unexpired token to its owner and mark it as used.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_user(
        &self,
        token_hash: &str,
    ) -> Result<Option<(AccessTokenId, User)>, RepositoryError> {
        let token: Option<(i32, i32)> = sqlx::query_as(
            r"
            UPDATE shop.access_token
            SET last_used_at = now()
            WHERE token_hash = $1 AND expires_at > now()
            RETURNING id, user_id
            ",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        let Some((id, user_id)) = token else {
            return Ok(None);
        };

        let user = super::UserRepository::new(self.pool)
            .get_by_id(UserId::new(user_id))
            .await?;

        Ok(user.map(|u| (AccessTokenId::new(id), u)))
    }

    /// Revoke a single token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn revoke(&self, id: AccessTokenId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.access_token WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Revoke every token of a user. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn revoke_all_for_user(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.access_token WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Drop expired tokens.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.access_token WHERE expires_at <= now()")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
