//! Review moderation.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use senmarket_core::{ProductId, ReviewId};

use crate::db::{PageRequest, ReviewRepository};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{Paginated, Review};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewListQuery {
    pub product_id: Option<ProductId>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<Paginated<Review>>, AppError> {
    let page = PageRequest::new(query.page, query.per_page);
    let (reviews, total) = ReviewRepository::new(state.pool())
        .list(query.product_id, page)
        .await?;
    Ok(Json(Paginated::new(reviews, total, page)))
}

/// Remove any review.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ReviewId>,
) -> Result<Json<Value>, AppError> {
    ReviewRepository::new(state.pool()).delete(id, None).await?;
    tracing::info!(review_id = %id, "Review removed by admin");
    Ok(Json(json!({ "message": "Review deleted" })))
}
