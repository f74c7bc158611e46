//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::email::EmailError as SendError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] senmarket_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Login attempted before the email was verified.
    #[error("email not verified")]
    EmailNotVerified,

    /// The account has been banned by an administrator.
    #[error("account is banned")]
    AccountBanned,

    /// A verified account already uses this email.
    #[error("email already registered")]
    EmailTaken,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("password confirmation does not match")]
    PasswordMismatch,

    /// Current password missing or wrong on a password change.
    #[error("current password is incorrect")]
    WrongCurrentPassword,

    /// One-time code wrong, expired, used up or never issued.
    #[error("invalid or expired code")]
    InvalidCode,

    /// A code was issued too recently to send another.
    #[error("please wait {retry_after_secs} seconds before requesting a new code")]
    ResendTooSoon { retry_after_secs: i64 },

    /// Bearer token missing, unknown or expired.
    #[error("invalid or expired token")]
    InvalidToken,

    /// Sending the code email failed.
    #[error("email delivery failed: {0}")]
    Email(#[from] SendError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
