//! Admin account commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a verified admin; a random password is printed when -p is omitted
//! sm-cli admin create -e admin@senmarket.vn -n "Quản trị viên"
//!
//! # Promote an existing customer
//! sm-cli admin promote -e lan@example.vn
//! ```

use rand::Rng;
use rand::distr::Alphanumeric;

use senmarket_core::{Email, UserId, UserRole};
use senmarket_storefront::db::UserRepository;
use senmarket_storefront::db::users::NewUser;
use senmarket_storefront::services::auth::{hash_password, validate_new_password};

use super::{CliError, connect};

/// Length of generated passwords.
const GENERATED_PASSWORD_LEN: usize = 16;

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// Create a verified admin account.
///
/// # Errors
///
/// Returns `CliError::UserExists` if the email is already registered.
pub async fn create(email: &str, name: &str, password: Option<String>) -> Result<UserId, CliError> {
    let email = Email::parse(email).map_err(|_| CliError::InvalidEmail(email.to_owned()))?;

    let generated = password.is_none();
    let password = password.unwrap_or_else(generate_password);
    validate_new_password(&password, &password)?;
    let password_hash = hash_password(&password)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);
    if users.get_by_email(&email).await?.is_some() {
        return Err(CliError::UserExists(email.to_string()));
    }

    let user = users
        .create(&NewUser {
            name: name.trim(),
            email: &email,
            phone: None,
            password_hash: Some(&password_hash),
            google_id: None,
            avatar_url: None,
            role: UserRole::Admin,
            verified: true,
        })
        .await?;

    tracing::info!("Admin created! ID: {}, Email: {}", user.id, user.email);
    if generated {
        #[allow(clippy::print_stdout)]
        {
            println!("Generated password (shown once): {password}");
        }
    }

    Ok(user.id)
}

/// Give an existing account the admin role.
///
/// # Errors
///
/// Returns `CliError::UserNotFound` if no account uses the email.
pub async fn promote(email: &str) -> Result<UserId, CliError> {
    let email = Email::parse(email).map_err(|_| CliError::InvalidEmail(email.to_owned()))?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);
    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| CliError::UserNotFound(email.to_string()))?;

    if user.is_admin() {
        tracing::info!("{} is already an admin", user.email);
        return Ok(user.id);
    }

    let user = users.set_role(user.id, UserRole::Admin).await?;
    tracing::info!("Promoted {} (ID {}) to admin", user.email, user.id);
    Ok(user.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_password() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LEN);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(validate_new_password(&password, &password).is_ok());
        assert_ne!(password, generate_password());
    }
}
