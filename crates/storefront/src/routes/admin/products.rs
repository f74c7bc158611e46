//! Product management.
//!
//! Listings include hidden products and accept the same filters as the
//! public catalog.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tracing::instrument;

use senmarket_core::{AMOUNT_LIMIT, ProductId, format_vnd};

use crate::db::ProductRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{Paginated, Product, ProductInput, slugify};
use crate::routes::catalog::ProductQuery;
use crate::state::AppState;
use crate::validation::{Validate, ValidationErrors};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/toggle", patch(toggle))
}

impl Validate for ProductInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_max("name", &self.name, 255);
        errors.check(
            self.price > Decimal::ZERO,
            "price",
            "The price must be greater than 0.",
        );
        errors.check(
            self.price < AMOUNT_LIMIT,
            "price",
            format!("The price must be less than {}.", format_vnd(AMOUNT_LIMIT)),
        );
        if let Some(sale_price) = self.sale_price {
            errors.check(
                sale_price > Decimal::ZERO && sale_price < self.price,
                "sale_price",
                "The sale price must be positive and lower than the price.",
            );
        }
        errors.check(self.stock >= 0, "stock", "The stock must not be negative.");
        if slug_for(self).is_empty() {
            errors.add("slug", "The slug must contain letters or digits.");
        }
        if let Some(url) = &self.image_url {
            errors.max_chars("image_url", url, 500);
        }
        errors.finish()
    }
}

/// Explicit slug when given, otherwise derived from the name.
fn slug_for(input: &ProductInput) -> String {
    match input.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => slugify(slug),
        _ => slugify(&input.name),
    }
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paginated<Product>>, AppError> {
    let page = query.page();
    let (products, total) = ProductRepository::new(state.pool())
        .list(&query.filter(true), page)
        .await?;
    Ok(Json(Paginated::new(products, total, page)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    ProductRepository::new(state.pool())
        .get(id, true)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    input.validate()?;

    let product = ProductRepository::new(state.pool())
        .create(&input, &slug_for(&input))
        .await?;
    state.invalidate_categories().await;

    tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, AppError> {
    input.validate()?;

    let product = ProductRepository::new(state.pool())
        .update(id, &input, &slug_for(&input))
        .await?;
    state.invalidate_categories().await;
    Ok(Json(product))
}

/// Show or hide a product.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    let product = ProductRepository::new(state.pool())
        .toggle_active(id)
        .await?;
    state.invalidate_categories().await;
    Ok(Json(product))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Value>, AppError> {
    ProductRepository::new(state.pool()).delete(id).await?;
    state.invalidate_categories().await;
    tracing::info!(product_id = %id, "Product deleted");
    Ok(Json(json!({ "message": "Product deleted" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        serde_json::from_str(
            r#"{
                "category_id": 1,
                "name": "Áo dài lụa",
                "price": "850000",
                "sale_price": "790000",
                "stock": 12
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_input() {
        let input = input();
        assert!(input.validate().is_ok());
        assert!(input.is_active);
        assert_eq!(slug_for(&input), "ao-dai-lua");
    }

    #[test]
    fn test_explicit_slug_is_normalized() {
        let mut input = input();
        input.slug = Some(" Áo Dài Mới ".to_string());
        assert_eq!(slug_for(&input), "ao-dai-moi");

        input.slug = Some("  ".to_string());
        assert_eq!(slug_for(&input), "ao-dai-lua");
    }

    #[test]
    fn test_price_rules() {
        let mut input = input();
        input.price = Decimal::ZERO;
        let errors = input.validate().unwrap_err();
        assert!(errors.fields().contains_key("price"));

        let mut input = self::input();
        input.sale_price = Some(Decimal::from(900_000));
        let errors = input.validate().unwrap_err();
        assert!(errors.fields().contains_key("sale_price"));

        let mut input = self::input();
        input.stock = -1;
        let errors = input.validate().unwrap_err();
        assert!(errors.fields().contains_key("stock"));
    }

    #[test]
    fn test_price_must_fit_storage() {
        let mut input = input();
        input.price = AMOUNT_LIMIT;
        input.sale_price = None;
        let errors = input.validate().unwrap_err();
        assert!(errors.fields().contains_key("price"));
    }
}
