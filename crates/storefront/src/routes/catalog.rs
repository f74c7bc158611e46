//! Public catalog: categories and products.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use senmarket_core::ProductId;

use crate::db::{CategoryRepository, PageRequest, ProductRepository};
use crate::error::AppError;
use crate::models::{Category, CategoryWithCount, Paginated, Product, ProductFilter, ProductSort};
use crate::state::AppState;

/// Related products shown under a product.
const RELATED_LIMIT: i64 = 4;

/// Build the catalog router (mounted at `/api`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/{slug}", get(show_category))
        .route("/products", get(list_products))
        .route("/products/{id}", get(show_product))
        .route("/products/{id}/related", get(related_products))
}

/// Listing parameters shared by the public and admin product lists.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ProductQuery {
    #[must_use]
    pub fn filter(&self, include_inactive: bool) -> ProductFilter {
        ProductFilter {
            search: non_empty(self.search.as_deref()),
            category: non_empty(self.category.as_deref()),
            min_price: self.min_price,
            max_price: self.max_price,
            sort: self.sort,
            include_inactive,
        }
    }

    #[must_use]
    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// All categories with their active product counts.
#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryWithCount>>, AppError> {
    let categories = state.categories().await?;
    Ok(Json(categories.as_ref().clone()))
}

#[instrument(skip(state))]
pub async fn show_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Category>, AppError> {
    CategoryRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
}

/// Active products, filtered and paginated.
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paginated<Product>>, AppError> {
    let page = query.page();
    let (products, total) = ProductRepository::new(state.pool())
        .list(&query.filter(false), page)
        .await?;
    Ok(Json(Paginated::new(products, total, page)))
}

/// One active product with its rating summary.
#[instrument(skip(state))]
pub async fn show_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    active_product(&state, id).await.map(Json)
}

#[instrument(skip(state))]
pub async fn related_products(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Vec<Product>>, AppError> {
    let product = active_product(&state, id).await?;
    let related = ProductRepository::new(state.pool())
        .related(&product, RELATED_LIMIT)
        .await?;
    Ok(Json(related))
}

/// Look up a product customers may see.
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown or hidden products.
pub async fn active_product(state: &AppState, id: ProductId) -> Result<Product, AppError> {
    ProductRepository::new(state.pool())
        .get(id, false)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let query: ProductQuery = serde_json::from_str("{}").unwrap();
        let filter = query.filter(false);
        assert_eq!(filter.sort, ProductSort::Newest);
        assert!(filter.search.is_none());
        assert_eq!(query.page(), PageRequest::new(Some(1), Some(12)));
    }

    #[test]
    fn test_query_blank_search_is_dropped() {
        let query = ProductQuery {
            search: Some("   ".to_string()),
            category: Some(" ao-thun ".to_string()),
            ..Default::default()
        };
        let filter = query.filter(true);
        assert!(filter.search.is_none());
        assert_eq!(filter.category.as_deref(), Some("ao-thun"));
        assert!(filter.include_inactive);
    }

    #[test]
    fn test_query_sort_from_string() {
        let query: ProductQuery = serde_json::from_str(r#"{"sort":"price_desc"}"#).unwrap();
        assert_eq!(query.sort, ProductSort::PriceDesc);
    }
}
