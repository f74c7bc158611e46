//! Account route handlers: the signed-in user's profile and password.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{ProfileUpdate, User};
use crate::state::AppState;
use crate::validation::{Validate, ValidationErrors};

/// Build the account router (mounted at `/api/user`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).put(update))
        .route("/password", put(change_password))
}

/// Profile fields; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub avatar_url: Option<String>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.require_max("name", name, 255);
        }
        if let Some(phone) = self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            errors.phone("phone", phone);
        }
        if let Some(address) = &self.address {
            errors.max_chars("address", address, 500);
        }
        if let Some(avatar_url) = &self.avatar_url {
            errors.max_chars("avatar_url", avatar_url, 2048);
        }
        errors.finish()
    }
}

impl UpdateProfileRequest {
    fn into_update(self) -> ProfileUpdate {
        ProfileUpdate {
            name: self.name.map(|n| n.trim().to_string()),
            phone: self.phone.map(|p| p.trim().to_string()),
            address: self.address.map(|a| a.trim().to_string()),
            avatar_url: self.avatar_url.map(|a| a.trim().to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub password: String,
    pub password_confirmation: String,
}

/// Current user.
pub async fn show(RequireAuth(current): RequireAuth) -> Json<User> {
    Json(current.user)
}

/// Update the profile.
#[instrument(skip(state, current, req), fields(user_id = %current.user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    req.validate()?;
    let user = UserRepository::new(state.pool())
        .update_profile(current.user.id, &req.into_update())
        .await?;
    Ok(Json(user))
}

/// Change (or, for Google-only accounts, set) the password.
#[instrument(skip(state, current, req), fields(user_id = %current.user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .auth()
        .change_password(
            current.user.id,
            req.current_password.as_deref(),
            &req.password,
            &req.password_confirmation,
        )
        .await?;
    Ok(Json(json!({ "message": "Password updated" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_update_is_valid() {
        assert!(UpdateProfileRequest::default().validate().is_ok());
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let req = UpdateProfileRequest {
            name: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(req.validate().unwrap_err().fields().contains_key("name"));
    }

    #[test]
    fn test_into_update_trims() {
        let update = UpdateProfileRequest {
            name: Some("  Lê Văn Cường ".to_string()),
            address: Some(" 5 Hai Bà Trưng, Hà Nội ".to_string()),
            ..Default::default()
        }
        .into_update();
        assert_eq!(update.name.as_deref(), Some("Lê Văn Cường"));
        assert_eq!(update.address.as_deref(), Some("5 Hai Bà Trưng, Hà Nội"));
        assert!(update.phone.is_none());
    }
}
