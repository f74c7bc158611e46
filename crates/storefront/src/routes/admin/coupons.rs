//! Coupon management.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use senmarket_core::{CouponId, TermsError};

use crate::db::{CouponRepository, PageRequest};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{Coupon, CouponInput, Paginated};
use crate::state::AppState;
use crate::validation::{Validate, ValidationErrors};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/toggle", patch(toggle))
}

#[derive(Debug, Default, Deserialize)]
pub struct CouponListQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Field a terms error is reported against.
const fn terms_field(error: &TermsError) -> &'static str {
    match error {
        TermsError::NonPositiveValue | TermsError::PercentageTooLarge => "value",
        TermsError::NonPositiveCap => "max_discount",
        TermsError::NegativeMinimum => "min_order_amount",
        TermsError::InvalidUsageLimit => "usage_limit",
        TermsError::InvalidWindow => "expires_at",
    }
}

/// Check the code and the discount rules. `used_count` is the stored
/// counter for edits, zero for new coupons.
fn validate_input(input: &CouponInput, used_count: i32) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let code = input.normalized_code();
    errors.require_max("code", &code, 50);
    errors.check(
        code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
        "code",
        "The code may only contain letters, digits, dashes and underscores.",
    );
    if let Err(e) = input.terms(used_count).validate() {
        let message = e.to_string();
        let mut chars = message.chars();
        let message = chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect::<String>())
            .unwrap_or_default();
        errors.add(terms_field(&e), format!("{message}."));
    } else if input.usage_limit.is_some_and(|limit| limit < used_count) {
        errors.add(
            "usage_limit",
            format!("The usage limit cannot be lower than the {used_count} uses so far."),
        );
    }
    errors.finish()
}

impl Validate for CouponInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_input(self, 0)
    }
}

async fn load(state: &AppState, id: CouponId) -> Result<Coupon, AppError> {
    CouponRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<CouponListQuery>,
) -> Result<Json<Paginated<Coupon>>, AppError> {
    let page = PageRequest::new(query.page, query.per_page);
    let (coupons, total) = CouponRepository::new(state.pool())
        .list(query.search.as_deref(), page)
        .await?;
    Ok(Json(Paginated::new(coupons, total, page)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<Json<Coupon>, AppError> {
    load(&state, id).await.map(Json)
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CouponInput>,
) -> Result<(StatusCode, Json<Coupon>), AppError> {
    input.validate()?;
    let coupon = CouponRepository::new(state.pool()).create(&input).await?;
    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "Coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
    Json(input): Json<CouponInput>,
) -> Result<Json<Coupon>, AppError> {
    let existing = load(&state, id).await?;
    validate_input(&input, existing.terms.used_count)?;

    let coupon = CouponRepository::new(state.pool()).update(id, &input).await?;
    Ok(Json(coupon))
}

/// Enable or disable a coupon.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<Json<Coupon>, AppError> {
    let coupon = CouponRepository::new(state.pool()).toggle_active(id).await?;
    Ok(Json(coupon))
}

/// Orders that used the coupon keep their code snapshot.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<Json<Value>, AppError> {
    CouponRepository::new(state.pool()).delete(id).await?;
    Ok(Json(json!({ "message": "Coupon deleted" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(json: &str) -> CouponInput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_valid_percentage_coupon() {
        let coupon = input(r#"{"code":" giam10 ","kind":"percentage","value":"10","max_discount":"50000"}"#);
        assert!(coupon.validate().is_ok());
        assert_eq!(coupon.normalized_code(), "GIAM10");
    }

    #[test]
    fn test_terms_errors_map_to_fields() {
        let errors = input(r#"{"code":"BIG","kind":"percentage","value":"150"}"#)
            .validate()
            .unwrap_err();
        assert_eq!(
            errors.fields()["value"],
            vec!["Percentage must not exceed 100.".to_string()]
        );

        let errors = input(
            r#"{"code":"WINDOW","kind":"fixed","value":"20000",
                "starts_at":"2026-05-01T00:00:00Z","expires_at":"2026-04-01T00:00:00Z"}"#,
        )
        .validate()
        .unwrap_err();
        assert!(errors.fields().contains_key("expires_at"));
    }

    #[test]
    fn test_usage_limit_below_uses() {
        let coupon = input(r#"{"code":"FREESHIP","kind":"fixed","value":"30000","usage_limit":5}"#);
        assert!(validate_input(&coupon, 5).is_ok());
        let errors = validate_input(&coupon, 6).unwrap_err();
        assert!(errors.fields().contains_key("usage_limit"));
    }

    #[test]
    fn test_code_characters() {
        let errors = input(r#"{"code":"giảm giá","kind":"fixed","value":"20000"}"#)
            .validate()
            .unwrap_err();
        assert!(errors.fields().contains_key("code"));
        assert!(input(r#"{"code":"  ","kind":"fixed","value":"20000"}"#).validate().is_err());
    }
}
