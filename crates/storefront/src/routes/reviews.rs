//! Product reviews.
//!
//! Anyone can read reviews. Only customers with a completed order containing
//! the product may write one, once per product.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use senmarket_core::{ProductId, ReviewId};

use crate::db::{PageRequest, ReviewRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{Paginated, Review};
use crate::routes::auth::non_blank;
use crate::routes::catalog::active_product;
use crate::state::AppState;
use crate::validation::{Validate, ValidationErrors};

/// Build the review router (mounted at `/api`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products/{id}/reviews", get(list).post(create))
        .route("/reviews/{id}", put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    pub comment: Option<String>,
}

impl Validate for ReviewRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(
            (1..=5).contains(&self.rating),
            "rating",
            "The rating must be between 1 and 5.",
        );
        if let Some(comment) = &self.comment {
            errors.max_chars("comment", comment, 2000);
        }
        errors.finish()
    }
}

/// Reviews of a product, newest first.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<Review>>, AppError> {
    let page = PageRequest::new(query.page, query.per_page);
    let (reviews, total) = ReviewRepository::new(state.pool())
        .list_for_product(id, page)
        .await?;
    Ok(Json(Paginated::new(reviews, total, page)))
}

/// Review a purchased product.
#[instrument(skip(state, current, req), fields(user_id = %current.user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<ProductId>,
    Json(req): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    req.validate()?;
    let product = active_product(&state, id).await?;

    let reviews = ReviewRepository::new(state.pool());
    if !reviews.has_completed_purchase(current.user.id, product.id).await? {
        return Err(AppError::Forbidden(
            "You can only review products from your completed orders".to_string(),
        ));
    }

    let review = reviews
        .create(
            current.user.id,
            product.id,
            req.rating,
            non_blank(req.comment.as_deref()),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Edit one's own review.
#[instrument(skip(state, current, req), fields(user_id = %current.user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<ReviewId>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Review>, AppError> {
    req.validate()?;
    let review = ReviewRepository::new(state.pool())
        .update(
            current.user.id,
            id,
            req.rating,
            non_blank(req.comment.as_deref()),
        )
        .await?;
    Ok(Json(review))
}

/// Delete one's own review.
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<ReviewId>,
) -> Result<Json<Value>, AppError> {
    ReviewRepository::new(state.pool())
        .delete(id, Some(current.user.id))
        .await?;
    Ok(Json(json!({ "message": "Review deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        for (rating, ok) in [(0, false), (1, true), (5, true), (6, false)] {
            let req = ReviewRequest {
                rating,
                comment: None,
            };
            assert_eq!(req.validate().is_ok(), ok, "rating {rating}");
        }
    }
}
