//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error renders as JSON: `{"message": "..."}`, plus `errors` for
//! validation failures and `reason` for rejected coupons.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use senmarket_core::QuoteError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::chatbot::ChatbotError;
use crate::services::export::ExportError;
use crate::services::google::GoogleError;
use crate::services::orders::OrderError;
use crate::validation::ValidationErrors;

/// Application-level error type for the shop API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout or order workflow failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Coupon cannot be applied, or the amount is out of range.
    #[error("Pricing error: {0}")]
    Pricing(#[from] QuoteError),

    /// Request body failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// Gemini call failed.
    #[error("Chatbot error: {0}")]
    Chatbot(#[from] ChatbotError),

    /// Google OAuth call failed.
    #[error("Google error: {0}")]
    Google(#[from] GoogleError),

    /// Spreadsheet generation failed.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request is well-formed but not allowed in the current state.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// An optional integration is not configured.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) | Self::Order(OrderError::Repository(err)) => repository_status(err),
            Self::Auth(err) => auth_status(err),
            Self::Order(err) => match err {
                OrderError::CouponNotFound | OrderError::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            Self::Pricing(_) | Self::Validation(_) | Self::Unprocessable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            // Upstream throttling is still an upstream failure.
            Self::Chatbot(_) | Self::Google(_) => StatusCode::BAD_GATEWAY,
            Self::Export(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-facing message. Internal details are never exposed.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Database(err) | Self::Order(OrderError::Repository(err)) => {
                repository_message(err)
            }
            Self::Auth(AuthError::Repository(err)) => repository_message(err),
            Self::Auth(AuthError::InvalidEmail(_)) => "Invalid email address".to_string(),
            Self::Auth(AuthError::Email(_)) => "Could not send email, please try again".to_string(),
            Self::Auth(AuthError::PasswordHash) => "Internal server error".to_string(),
            Self::Auth(err) => capitalize(&err.to_string()),
            Self::Order(err) => capitalize(&err.to_string()),
            Self::Pricing(err) => capitalize(&err.to_string()),
            Self::Validation(errors) => errors
                .first_message()
                .unwrap_or("The given data was invalid.")
                .to_string(),
            Self::Chatbot(ChatbotError::RateLimited) => {
                "Assistant is busy, please try again shortly".to_string()
            }
            Self::Chatbot(_) | Self::Google(_) => "External service error".to_string(),
            Self::Export(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::RateLimited => "Too many requests".to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Unprocessable(msg)
            | Self::ServiceUnavailable(msg) => msg.clone(),
        }
    }

    fn body(&self) -> Value {
        let mut body = json!({ "message": self.message() });
        match self {
            Self::Validation(errors) => {
                body["errors"] = json!(errors.fields());
            }
            Self::Pricing(err) | Self::Order(OrderError::Pricing(err)) => {
                body["reason"] = json!(err.code());
            }
            Self::Auth(AuthError::ResendTooSoon { retry_after_secs }) => {
                body["retry_after"] = json!(retry_after_secs);
            }
            _ => {}
        }
        body
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::NotFound => "Resource not found".to_string(),
        RepositoryError::Conflict(msg) => capitalize(msg),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            "Internal server error".to_string()
        }
    }
}

const fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        AuthError::EmailNotVerified | AuthError::AccountBanned => StatusCode::FORBIDDEN,
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::InvalidEmail(_)
        | AuthError::WeakPassword(_)
        | AuthError::PasswordMismatch
        | AuthError::WrongCurrentPassword => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::InvalidCode => StatusCode::BAD_REQUEST,
        AuthError::ResendTooSoon { .. } => StatusCode::TOO_MANY_REQUESTS,
        AuthError::Repository(err) => repository_status(err),
        AuthError::Email(_) | AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors and upstream failures to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the authenticated user.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb
                .data
                .insert((*key).to_string(), Value::String((*value).to_string()));
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use rust_decimal::Decimal;
    use senmarket_core::CouponRejection;

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 123".to_string());
        assert_eq!(err.to_string(), "Not found: product 123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::Database(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database(RepositoryError::Conflict("x".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Auth(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Auth(AuthError::EmailNotVerified).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Auth(AuthError::ResendTooSoon { retry_after_secs: 5 }).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Order(OrderError::EmptyCart).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Order(OrderError::CouponNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Chatbot(ChatbotError::EmptyReply).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Chatbot(ChatbotError::RateLimited).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::ServiceUnavailable("off".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) = body_json(AppError::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");

        let (_, body) = body_json(AppError::Database(RepositoryError::DataCorruption(
            "bad enum".into(),
        )))
        .await;
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_validation_body_has_field_map() {
        let mut errors = ValidationErrors::new();
        errors.require("name", "");
        let (status, body) = body_json(errors.into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "The name field is required.");
        assert_eq!(body["errors"]["name"][0], "The name field is required.");
    }

    #[tokio::test]
    async fn test_coupon_body_has_reason() {
        let rejection = CouponRejection::BelowMinimum {
            minimum: Decimal::from(200_000),
        };
        let (status, body) =
            body_json(AppError::Order(OrderError::Pricing(rejection.into()))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["reason"], "below_minimum");
        assert_eq!(
            body["message"],
            "Coupon rejected: order subtotal must be at least 200.000 ₫"
        );
    }

    #[tokio::test]
    async fn test_oversized_amount_is_unprocessable() {
        let (status, body) = body_json(AppError::Pricing(QuoteError::AmountTooLarge)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["reason"], "amount_too_large");
    }

    #[tokio::test]
    async fn test_conflict_message() {
        let (status, body) = body_json(AppError::Database(RepositoryError::Conflict(
            "coupon code already exists".into(),
        )))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Coupon code already exists");
    }
}
