//! Authentication service.
//!
//! Password login with email verification by one-time code, Google sign-in,
//! and opaque bearer tokens. Raw tokens and codes never touch the database;
//! only their SHA-256 digests are stored.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use senmarket_core::{AccessTokenId, Email, OtpPurpose, UserId, UserRole};

use crate::db::RepositoryError;
use crate::db::otp::OtpRepository;
use crate::db::tokens::AccessTokenRepository;
use crate::db::users::{NewUser, UserRepository};
use crate::models::User;
use crate::services::email::{EmailService, generate_verification_code};
use crate::services::google::GoogleProfile;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Lifetime of a one-time code.
pub const OTP_TTL_MINUTES: i64 = 10;

/// Wrong guesses allowed before a code is dead.
pub const OTP_MAX_ATTEMPTS: i32 = 5;

/// Minimum gap between two codes for the same email and purpose.
pub const OTP_RESEND_COOLDOWN_SECS: i64 = 60;

/// Random bytes in a bearer token.
const TOKEN_BYTES: usize = 32;

/// Registration form after field validation.
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub password: &'a str,
    pub password_confirmation: &'a str,
}

/// A freshly issued bearer token and its owner.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub user: User,
}

/// Authentication service.
///
/// Handles registration, login, one-time codes and token management.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    tokens: AccessTokenRepository<'a>,
    otps: OtpRepository<'a>,
    email: &'a EmailService,
    token_ttl: Duration,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(pool: &'a PgPool, email: &'a EmailService, token_ttl_days: i64) -> Self {
        Self {
            users: UserRepository::new(pool),
            tokens: AccessTokenRepository::new(pool),
            otps: OtpRepository::new(pool),
            email,
            token_ttl: Duration::days(token_ttl_days),
        }
    }

    // =========================================================================
    // Registration & Verification
    // =========================================================================

    /// Register a customer and email them a verification code.
    ///
    /// Registering again with the email of an account that never verified
    /// replaces its name, phone and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailTaken` if a verified account uses the email.
    /// Returns `AuthError::WeakPassword` or `AuthError::PasswordMismatch` on a bad password.
    /// Returns `AuthError::ResendTooSoon` if an unverified account was sent a
    /// code within the cooldown.
    pub async fn register(&self, form: &Registration<'_>) -> Result<User, AuthError> {
        let email = Email::parse(form.email)?;
        validate_new_password(form.password, form.password_confirmation)?;
        let password_hash = hash_password(form.password)?;

        let user = match self.users.get_by_email(&email).await? {
            Some(existing) if existing.is_verified() => return Err(AuthError::EmailTaken),
            Some(existing) => {
                self.check_cooldown(&email, OtpPurpose::Register).await?;
                self.users
                    .refresh_unverified(existing.id, form.name, form.phone, &password_hash)
                    .await?
            }
            None => self
                .users
                .create(&NewUser {
                    name: form.name,
                    email: &email,
                    phone: form.phone,
                    password_hash: Some(&password_hash),
                    google_id: None,
                    avatar_url: None,
                    role: UserRole::Customer,
                    verified: false,
                })
                .await
                .map_err(|e| match e {
                    RepositoryError::Conflict(_) => AuthError::EmailTaken,
                    other => AuthError::Repository(other),
                })?,
        };

        self.send_code(&user, OtpPurpose::Register).await?;
        tracing::info!(user_id = %user.id, "Customer registered");

        Ok(user)
    }

    /// Redeem a registration code: verify the email and sign the user in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCode` if the code is wrong, expired or used up.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<IssuedToken, AuthError> {
        let email = Email::parse(email)?;
        self.redeem_code(&email, OtpPurpose::Register, code).await?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCode)?;
        let user = self.users.mark_verified(user.id).await?;

        if user.is_banned() {
            return Err(AuthError::AccountBanned);
        }

        self.issue_token(user, "verify-otp").await
    }

    /// Send a fresh code.
    ///
    /// Unknown emails, and registration codes for already verified accounts,
    /// succeed without sending anything. They still start the cooldown, so
    /// a repeated request is throttled the same way whether or not the
    /// account exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ResendTooSoon` if the last code is younger than the cooldown.
    pub async fn resend_code(&self, email: &str, purpose: OtpPurpose) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        self.check_cooldown(&email, purpose).await?;

        match self.users.get_by_email(&email).await? {
            Some(user) if !(purpose == OtpPurpose::Register && user.is_verified()) => {
                self.send_code(&user, purpose).await
            }
            _ => self.record_unsent_code(&email, purpose).await,
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::EmailNotVerified` or `AuthError::AccountBanned` for blocked accounts.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let password_hash = password_hash.ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if user.is_banned() {
            return Err(AuthError::AccountBanned);
        }
        if !user.is_verified() {
            return Err(AuthError::EmailNotVerified);
        }

        self.issue_token(user, "password").await
    }

    /// Start a password reset. Always succeeds from the caller's view.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` or `AuthError::Email` on infrastructure failure.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(());
        };

        match self.resend_code(email.as_str(), OtpPurpose::PasswordReset).await {
            Err(AuthError::ResendTooSoon { .. }) => {
                tracing::debug!("Password reset requested during cooldown");
                Ok(())
            }
            other => other,
        }
    }

    /// Redeem a reset code, set the new password and sign out every session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCode` if the code is wrong, expired or used up.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        password: &str,
        password_confirmation: &str,
    ) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        validate_new_password(password, password_confirmation)?;
        self.redeem_code(&email, OtpPurpose::PasswordReset, code)
            .await?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCode)?;

        let password_hash = hash_password(password)?;
        self.users.set_password(user.id, &password_hash).await?;
        let revoked = self.tokens.revoke_all_for_user(user.id).await?;

        tracing::info!(user_id = %user.id, revoked, "Password reset");
        Ok(())
    }

    /// Change the password of a signed-in user.
    ///
    /// Accounts created through Google have no password yet and may set one
    /// without `current`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WrongCurrentPassword` if `current` is missing or wrong.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: Option<&str>,
        password: &str,
        password_confirmation: &str,
    ) -> Result<(), AuthError> {
        validate_new_password(password, password_confirmation)?;

        if let Some(existing) = self.users.get_password_hash(user_id).await? {
            let current = current.ok_or(AuthError::WrongCurrentPassword)?;
            verify_password(current, &existing).map_err(|_| AuthError::WrongCurrentPassword)?;
        }

        let password_hash = hash_password(password)?;
        self.users.set_password(user_id, &password_hash).await?;
        Ok(())
    }

    // =========================================================================
    // Google Sign-In
    // =========================================================================

    /// Sign in with a verified Google profile.
    ///
    /// Matches by Google ID, then by email (linking the account), and
    /// otherwise creates a verified customer. Linking an account that never
    /// verified its email drops its password and signs out its sessions.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccountBanned` for banned accounts.
    pub async fn login_with_google(&self, profile: &GoogleProfile) -> Result<IssuedToken, AuthError> {
        let email = Email::parse(&profile.email)?;

        let user = if let Some(user) = self.users.get_by_google_id(&profile.sub).await? {
            user
        } else if let Some(user) = self.users.get_by_email(&email).await? {
            let linked = self
                .users
                .link_google(user.id, &profile.sub, profile.picture.as_deref())
                .await?;
            if !user.is_verified() {
                // The password was set by someone who never proved the mailbox.
                let revoked = self.tokens.revoke_all_for_user(user.id).await?;
                tracing::info!(user_id = %user.id, revoked, "Unverified account claimed through Google");
            }
            linked
        } else {
            let name = profile
                .name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| email.local_part());
            self.users
                .create(&NewUser {
                    name,
                    email: &email,
                    phone: None,
                    password_hash: None,
                    google_id: Some(&profile.sub),
                    avatar_url: profile.picture.as_deref(),
                    role: UserRole::Customer,
                    verified: true,
                })
                .await?
        };

        if user.is_banned() {
            return Err(AuthError::AccountBanned);
        }

        self.issue_token(user, "google").await
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Issue a bearer token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the token cannot be stored.
    pub async fn issue_token(&self, user: User, name: &str) -> Result<IssuedToken, AuthError> {
        let token = generate_token();
        let expires_at = Utc::now() + self.token_ttl;
        self.tokens
            .create(user.id, &hash_token(&token), name, expires_at)
            .await?;

        Ok(IssuedToken { token, user })
    }

    /// Resolve a bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is unknown or expired.
    pub async fn authenticate(&self, token: &str) -> Result<(AccessTokenId, User), AuthError> {
        self.tokens
            .find_user(&hash_token(token))
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Revoke the token used for the current request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the delete fails.
    pub async fn logout(&self, token_id: AccessTokenId) -> Result<(), AuthError> {
        self.tokens.revoke(token_id).await?;
        Ok(())
    }

    // =========================================================================
    // One-Time Codes
    // =========================================================================

    async fn send_code(&self, user: &User, purpose: OtpPurpose) -> Result<(), AuthError> {
        let code = generate_verification_code();
        let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);
        self.otps
            .replace(user.email.as_str(), purpose, &hash_token(&code), expires_at)
            .await?;

        self.email
            .send_otp(user.email.as_str(), &user.name, &code, purpose, OTP_TTL_MINUTES)
            .await?;
        Ok(())
    }

    async fn check_cooldown(&self, email: &Email, purpose: OtpPurpose) -> Result<(), AuthError> {
        let wait = self
            .otps
            .latest(email.as_str(), purpose)
            .await?
            .and_then(|last| last.resend_wait(Utc::now(), OTP_RESEND_COOLDOWN_SECS));

        match wait {
            Some(retry_after_secs) => Err(AuthError::ResendTooSoon { retry_after_secs }),
            None => Ok(()),
        }
    }

    /// Store a code nobody receives. It can never be redeemed.
    async fn record_unsent_code(&self, email: &Email, purpose: OtpPurpose) -> Result<(), AuthError> {
        let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);
        self.otps
            .replace(email.as_str(), purpose, &hash_token(&generate_token()), expires_at)
            .await?;
        Ok(())
    }

    async fn redeem_code(
        &self,
        email: &Email,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<(), AuthError> {
        let otp = self
            .otps
            .latest(email.as_str(), purpose)
            .await?
            .ok_or(AuthError::InvalidCode)?;

        if !otp.is_usable(Utc::now(), OTP_MAX_ATTEMPTS) {
            return Err(AuthError::InvalidCode);
        }

        if otp.code_hash != hash_token(code.trim()) {
            let attempts = self.otps.record_failed_attempt(otp.id).await?;
            tracing::warn!(otp_id = %otp.id, attempts, "Wrong one-time code");
            return Err(AuthError::InvalidCode);
        }

        if !self.otps.consume(otp.id).await? {
            return Err(AuthError::InvalidCode);
        }
        Ok(())
    }
}

/// Validate password meets requirements and matches its confirmation.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` or `AuthError::PasswordMismatch`.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password != confirmation {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// A new random bearer token, base64url without padding.
#[must_use]
pub fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest used to store tokens and codes.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_rules() {
        assert!(matches!(
            validate_new_password("short", "short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            validate_new_password("long enough", "long enougH"),
            Err(AuthError::PasswordMismatch)
        ));
        assert!(validate_new_password("mật khẩu an", "mật khẩu an").is_ok());
    }

    #[test]
    fn test_password_length_counts_characters() {
        // 7 characters, more than 8 bytes
        assert!(validate_new_password("mậtkhẩu", "mậtkhẩu").is_err());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_generate_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(a.len(), 43);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_token("abc"), digest);
    }
}
