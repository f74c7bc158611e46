//! Authentication route handlers.
//!
//! Registration with email verification, password login, password reset
//! and logout. Successful sign-ins answer with a bearer token.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use senmarket_core::OtpPurpose;

use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::{IssuedToken, Registration};
use crate::state::AppState;
use crate::validation::{Validate, ValidationErrors};

/// Build the auth router (mounted at `/api/auth`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub password_confirmation: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_max("name", &self.name, 255);
        errors.require_max("email", &self.email, 255);
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            errors.phone("phone", phone.trim());
        }
        errors.require("password", &self.password);
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub email: String,
    #[serde(default = "default_purpose")]
    pub purpose: OtpPurpose,
}

const fn default_purpose() -> OtpPurpose {
    OtpPurpose::Register
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub password: String,
    pub password_confirmation: String,
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require("email", &self.email);
        errors.require("code", &self.code);
        errors.require("password", &self.password);
        errors.finish()
    }
}

/// A bearer token and the user it belongs to.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub user: User,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            token_type: "Bearer",
            user: issued.user,
        }
    }
}

/// Non-empty trimmed optional string.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Handlers
// =============================================================================

/// Create an unverified account and send its verification code.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let user = state
        .auth()
        .register(&Registration {
            name: req.name.trim(),
            email: &req.email,
            phone: non_blank(req.phone.as_deref()),
            password: &req.password,
            password_confirmation: &req.password_confirmation,
        })
        .await?;

    add_breadcrumb("auth", "Registered", None);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful. Please check your email for the verification code.",
            "email": user.email,
        })),
    ))
}

/// Redeem a registration code and sign in.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let issued = state.auth().verify_email(&req.email, req.code.trim()).await?;
    Ok(Json(issued.into()))
}

/// Send a fresh code.
#[instrument(skip(state, req), fields(email = %req.email, purpose = %req.purpose))]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(req): Json<ResendOtpRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.auth().resend_code(&req.email, req.purpose).await?;
    Ok(Json(json!({
        "message": "If the account exists, a new code has been sent.",
    })))
}

/// Password login.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let issued = state.auth().login(&req.email, &req.password).await?;
    add_breadcrumb("auth", "Logged in", None);
    Ok(Json(issued.into()))
}

/// Revoke the presented token.
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<serde_json::Value>, AppError> {
    state.auth().logout(current.token_id).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

/// Start a password reset. Answers the same whether or not the account exists.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.auth().forgot_password(&req.email).await?;
    Ok(Json(json!({
        "message": "If the account exists, a password reset code has been sent.",
    })))
}

/// Set a new password with a reset code.
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    req.validate()?;
    state
        .auth()
        .reset_password(
            &req.email,
            req.code.trim(),
            &req.password,
            &req.password_confirmation,
        )
        .await?;
    Ok(Json(json!({
        "message": "Password has been reset. Please sign in again.",
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registration() -> RegisterRequest {
        RegisterRequest {
            name: "Trần Thị Bình".to_string(),
            email: "binh@example.vn".to_string(),
            phone: Some("0912345678".to_string()),
            password: "matkhau123".to_string(),
            password_confirmation: "matkhau123".to_string(),
        }
    }

    #[test]
    fn test_register_request_validation() {
        assert!(registration().validate().is_ok());

        let mut req = registration();
        req.name = "  ".to_string();
        req.phone = Some("12ab".to_string());
        let errors = req.validate().unwrap_err();
        assert!(errors.fields().contains_key("name"));
        assert!(errors.fields().contains_key("phone"));
    }

    #[test]
    fn test_blank_phone_is_ignored() {
        let mut req = registration();
        req.phone = Some("   ".to_string());
        assert!(req.validate().is_ok());
        assert_eq!(non_blank(req.phone.as_deref()), None);
    }

    #[test]
    fn test_resend_purpose_defaults_to_register() {
        let req: ResendOtpRequest = serde_json::from_str(r#"{"email":"a@b.vn"}"#).unwrap();
        assert_eq!(req.purpose, OtpPurpose::Register);

        let req: ResendOtpRequest =
            serde_json::from_str(r#"{"email":"a@b.vn","purpose":"password_reset"}"#).unwrap();
        assert_eq!(req.purpose, OtpPurpose::PasswordReset);
    }
}
