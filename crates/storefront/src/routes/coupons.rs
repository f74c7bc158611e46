//! Coupon validation for the checkout page.

use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use senmarket_core::{AMOUNT_LIMIT, FormattedQuote, PricedLine, Quote, format_vnd};

use crate::db::{CartRepository, CouponRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{normalize_code, purchasable_lines};
use crate::state::AppState;
use crate::validation::{Validate, ValidationErrors};

/// Build the coupon router (mounted at `/api/coupons`).
pub fn router() -> Router<AppState> {
    Router::new().route("/validate", post(validate))
}

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    /// Price this amount instead of the current cart.
    pub subtotal: Option<Decimal>,
}

impl Validate for ValidateCouponRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if normalize_code(&self.code).is_empty() {
            errors.add("code", "The code field is required.");
        }
        if let Some(subtotal) = self.subtotal {
            errors.check(
                subtotal >= Decimal::ZERO,
                "subtotal",
                "The subtotal must not be negative.",
            );
            errors.check(
                subtotal < AMOUNT_LIMIT,
                "subtotal",
                format!("The subtotal must be less than {}.", format_vnd(AMOUNT_LIMIT)),
            );
        }
        errors.finish()
    }
}

/// A coupon that applies, and what it does to the order.
#[derive(Debug, Serialize)]
pub struct CouponQuote {
    pub code: String,
    #[serde(flatten)]
    pub quote: Quote,
    pub formatted: FormattedQuote,
}

/// Check a code against the cart (or a given subtotal).
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn validate(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(req): Json<ValidateCouponRequest>,
) -> Result<Json<CouponQuote>, AppError> {
    req.validate()?;
    let code = normalize_code(&req.code);

    let coupon = CouponRepository::new(state.pool())
        .get_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))?;

    let lines = match req.subtotal {
        Some(subtotal) => vec![PricedLine::new(subtotal, 1)],
        None => CartRepository::new(state.pool())
            .list(current.user.id)
            .await
            .map(|items| purchasable_lines(&items))?,
    };

    let quote = Quote::compute(
        &lines,
        Some(&coupon.terms),
        &state.config().shipping,
        Utc::now(),
    )?;

    Ok(Json(CouponQuote {
        code: coupon.code,
        formatted: quote.formatted(),
        quote,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(json: &str) -> ValidateCouponRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_validate_accepts_cart_or_subtotal() {
        assert!(request(r#"{"code":"giam10"}"#).validate().is_ok());
        assert!(request(r#"{"code":"GIAM10","subtotal":"450000"}"#).validate().is_ok());
    }

    #[test]
    fn test_validate_requires_code() {
        let errors = request(r#"{"code":"  "}"#).validate().unwrap_err();
        assert!(errors.fields().contains_key("code"));
    }

    #[test]
    fn test_validate_bounds_subtotal() {
        let errors = request(r#"{"code":"GIAM10","subtotal":"-1"}"#)
            .validate()
            .unwrap_err();
        assert!(errors.fields().contains_key("subtotal"));

        let errors = request(r#"{"code":"GIAM10","subtotal":"10000000000000"}"#)
            .validate()
            .unwrap_err();
        assert_eq!(
            errors.fields()["subtotal"],
            ["The subtotal must be less than 10.000.000.000.000 ₫."]
        );

        assert!(
            request(r#"{"code":"GIAM10","subtotal":"9999999999999"}"#)
                .validate()
                .is_ok()
        );
    }
}
