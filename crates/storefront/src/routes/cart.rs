//! Cart route handlers.
//!
//! The cart lives in the database, one line per product. Every response
//! carries the full cart with a coupon-less quote so the frontend can
//! re-render the summary without a second request.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use senmarket_core::{CartItemId, ProductId, UserId};

use crate::db::CartRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::CartView;
use crate::routes::catalog::active_product;
use crate::state::AppState;
use crate::validation::ValidationErrors;

/// Build the cart router (mounted at `/api/cart`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).post(add).delete(clear))
        .route("/{item_id}", put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub quantity: i32,
}

fn check_quantity(quantity: i32) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check(quantity >= 1, "quantity", "The quantity must be at least 1.");
    errors.finish()
}

/// Reject a line quantity above what is in stock.
fn check_stock(name: &str, wanted: i32, stock: i32) -> Result<(), AppError> {
    if wanted > stock {
        return Err(AppError::Unprocessable(format!(
            "Only {stock} of \"{name}\" left in stock"
        )));
    }
    Ok(())
}

async fn cart_view(state: &AppState, user_id: UserId) -> Result<CartView, AppError> {
    let items = CartRepository::new(state.pool()).list(user_id).await?;
    Ok(CartView::new(items, &state.config().shipping)?)
}

/// Current cart with totals.
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(cart_view(&state, current.user.id).await?))
}

/// Add a product, merging with an existing line.
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartView>), AppError> {
    check_quantity(req.quantity)?;
    let user_id = current.user.id;

    let product = active_product(&state, req.product_id).await?;
    let carts = CartRepository::new(state.pool());
    let existing = carts.quantity_of(user_id, product.id).await?;
    check_stock(&product.name, existing.saturating_add(req.quantity), product.stock)?;

    carts.add(user_id, &product, req.quantity).await?;
    tracing::debug!(product_id = %product.id, quantity = req.quantity, "Added to cart");

    Ok((StatusCode::CREATED, Json(cart_view(&state, user_id).await?)))
}

/// Set the quantity of a line.
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(item_id): Path<CartItemId>,
    Json(req): Json<UpdateCartRequest>,
) -> Result<Json<CartView>, AppError> {
    check_quantity(req.quantity)?;
    let user_id = current.user.id;

    let carts = CartRepository::new(state.pool());
    let line = carts
        .get(user_id, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;
    if !line.is_active {
        return Err(AppError::Unprocessable(format!(
            "\"{}\" is no longer available",
            line.product_name
        )));
    }
    check_stock(&line.product_name, req.quantity, line.stock)?;

    carts.set_quantity(user_id, item_id, req.quantity).await?;
    Ok(Json(cart_view(&state, user_id).await?))
}

/// Remove one line.
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<CartView>, AppError> {
    CartRepository::new(state.pool())
        .remove(current.user.id, item_id)
        .await?;
    Ok(Json(cart_view(&state, current.user.id).await?))
}

/// Empty the cart.
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<CartView>, AppError> {
    CartRepository::new(state.pool())
        .clear(current.user.id)
        .await?;
    Ok(Json(cart_view(&state, current.user.id).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_check_quantity() {
        assert!(check_quantity(1).is_ok());
        assert!(check_quantity(0).is_err());
        assert!(check_quantity(-3).is_err());
    }

    #[test]
    fn test_check_stock() {
        assert!(check_stock("Áo thun", 3, 3).is_ok());
        let err = check_stock("Áo thun", 4, 3);
        assert!(matches!(err, Err(AppError::Unprocessable(msg)) if msg.contains("Only 3")));
    }

    #[test]
    fn test_add_request_default_quantity() {
        let req: AddToCartRequest = serde_json::from_str(r#"{"product_id":7}"#).unwrap();
        assert_eq!(req.product_id, ProductId::new(7));
        assert_eq!(req.quantity, 1);
    }
}
