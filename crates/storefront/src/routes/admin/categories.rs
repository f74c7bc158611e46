//! Category management.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use senmarket_core::CategoryId;

use crate::db::CategoryRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{Category, CategoryWithCount, slugify};
use crate::routes::auth::non_blank;
use crate::state::AppState;
use crate::validation::{Validate, ValidationErrors};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

impl Validate for CategoryRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_max("name", &self.name, 255);
        if !self.name.trim().is_empty() && slugify(&self.name).is_empty() {
            errors.add("name", "The name must contain letters or digits.");
        }
        if let Some(description) = &self.description {
            errors.max_chars("description", description, 2000);
        }
        errors.finish()
    }
}

/// Categories with product counts, read straight from the database.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<Vec<CategoryWithCount>>, AppError> {
    let categories = CategoryRepository::new(state.pool())
        .list_with_counts()
        .await?;
    Ok(Json(categories))
}

#[instrument(skip(state, admin, req), fields(admin_id = %admin.user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(req): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    req.validate()?;
    let name = req.name.trim();

    let category = CategoryRepository::new(state.pool())
        .create(name, &slugify(name), non_blank(req.description.as_deref()))
        .await?;
    state.invalidate_categories().await;

    tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, admin, req), fields(admin_id = %admin.user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(req): Json<CategoryRequest>,
) -> Result<Json<Category>, AppError> {
    req.validate()?;
    let name = req.name.trim();

    let category = CategoryRepository::new(state.pool())
        .update(id, name, &slugify(name), non_blank(req.description.as_deref()))
        .await?;
    state.invalidate_categories().await;
    Ok(Json(category))
}

/// Products in the category become uncategorised.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<Json<Value>, AppError> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    state.invalidate_categories().await;
    Ok(Json(json!({ "message": "Category deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> CategoryRequest {
        CategoryRequest {
            name: name.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_name_is_required() {
        assert!(request("Thời trang nữ").validate().is_ok());
        assert!(request("   ").validate().is_err());
    }

    #[test]
    fn test_name_must_produce_a_slug() {
        let errors = request("!!!").validate();
        assert!(errors.is_err());
    }
}
