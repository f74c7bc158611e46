//! Customer order route handlers: checkout, history and cancellation.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use senmarket_core::{OrderId, OrderStatus, PaymentMethod};

use crate::db::{OrderRepository, PageRequest};
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderDetail, OrderListEntry, Paginated};
use crate::routes::auth::non_blank;
use crate::services::orders::Checkout;
use crate::state::AppState;
use crate::validation::{Validate, ValidationErrors};

/// Build the customer order router (mounted at `/api/orders`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(place))
        .route("/{id}", get(show))
        .route("/{id}/cancel", post(cancel))
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub recipient_name: String,
    pub phone: String,
    pub shipping_address: String,
    pub note: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

impl Validate for PlaceOrderRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_max("recipient_name", &self.recipient_name, 255);
        errors.require("phone", &self.phone);
        if !self.phone.trim().is_empty() {
            errors.phone("phone", self.phone.trim());
        }
        errors.require_max("shipping_address", &self.shipping_address, 500);
        if let Some(note) = &self.note {
            errors.max_chars("note", note, 1000);
        }
        if let Some(code) = &self.coupon_code {
            errors.max_chars("coupon_code", code, 50);
        }
        errors.finish()
    }
}

impl PlaceOrderRequest {
    fn checkout(&self) -> Checkout<'_> {
        Checkout {
            recipient_name: self.recipient_name.trim(),
            phone: self.phone.trim(),
            shipping_address: self.shipping_address.trim(),
            note: non_blank(self.note.as_deref()),
            payment_method: self.payment_method,
            coupon_code: non_blank(self.coupon_code.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Place an order from the cart.
#[instrument(skip(state, current, req), fields(user_id = %current.user.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    req.validate()?;

    let order = state.orders().place(current.user.id, &req.checkout()).await?;

    let order_id = order.order.id.to_string();
    add_breadcrumb("order", "Order placed", Some(&[("order_id", order_id.as_str())]));

    Ok((StatusCode::CREATED, Json(order)))
}

/// The user's orders, newest first.
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Paginated<OrderListEntry>>, AppError> {
    let page = PageRequest::new(query.page, query.per_page);
    let (orders, total) = OrderRepository::new(state.pool())
        .list_for_user(current.user.id, query.status, page)
        .await?;
    Ok(Json(Paginated::new(orders, total, page)))
}

/// One of the user's orders with its lines.
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get_for_user(current.user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let items = orders.items(id).await?;

    Ok(Json(OrderDetail {
        order,
        items,
        customer: None,
    }))
}

/// Cancel a pending order.
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders().cancel_by_customer(current.user.id, id).await?;
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> PlaceOrderRequest {
        serde_json::from_str(
            r#"{
                "recipient_name": " Phạm Minh Đức ",
                "phone": "0987654321",
                "shipping_address": "88 Nguyễn Huệ, Quận 1, TP.HCM",
                "note": "  ",
                "coupon_code": " giam10 "
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_payment_method_defaults_to_cod() {
        assert_eq!(request().payment_method, PaymentMethod::Cod);
    }

    #[test]
    fn test_checkout_trims_and_drops_blanks() {
        let req = request();
        assert!(req.validate().is_ok());
        let checkout = req.checkout();
        assert_eq!(checkout.recipient_name, "Phạm Minh Đức");
        assert_eq!(checkout.note, None);
        assert_eq!(checkout.coupon_code, Some("giam10"));
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let mut req = request();
        req.phone = String::new();
        req.shipping_address = " ".to_string();
        let errors = req.validate().unwrap_err();
        assert!(errors.fields().contains_key("phone"));
        assert!(errors.fields().contains_key("shipping_address"));
        assert_eq!(errors.fields()["phone"].len(), 1);
    }
}
