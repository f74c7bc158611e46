//! Order management and spreadsheet export.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, patch},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use senmarket_core::{OrderId, OrderStatus};

use crate::db::{OrderRepository, PageRequest, UserRepository, orders::OrderFilter};
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderCustomer, OrderDetail, OrderListEntry, Paginated};
use crate::services::export::{XLSX_CONTENT_TYPE, export_file_name, orders_workbook};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/export", get(export))
        .route("/{id}", get(show).delete(remove))
        .route("/{id}/status", patch(change_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminOrderQuery {
    pub status: Option<OrderStatus>,
    /// Order number, recipient, phone or buyer email.
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl AdminOrderQuery {
    fn filter(&self) -> OrderFilter {
        OrderFilter {
            status: self.status,
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: OrderStatus,
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<AdminOrderQuery>,
) -> Result<Json<Paginated<OrderListEntry>>, AppError> {
    let page = PageRequest::new(query.page, query.per_page);
    let (orders, total) = OrderRepository::new(state.pool())
        .list(&query.filter(), page)
        .await?;
    Ok(Json(Paginated::new(orders, total, page)))
}

/// An order with its lines and the account that placed it.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let items = orders.items(id).await?;
    let customer = UserRepository::new(state.pool())
        .get_by_id(order.user_id)
        .await?
        .map(|user| OrderCustomer {
            id: user.id,
            name: user.name,
            email: user.email.into_inner(),
        });

    Ok(Json(OrderDetail {
        order,
        items,
        customer,
    }))
}

/// Move an order along its status graph.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn change_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders().change_status(id, req.status).await?;

    let order_id = order.id.to_string();
    add_breadcrumb(
        "order",
        "Order status changed",
        Some(&[("order_id", order_id.as_str()), ("status", order.status.as_str())]),
    );
    Ok(Json(order))
}

/// Delete a completed or cancelled order.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<Value>, AppError> {
    state.orders().delete(id).await?;
    tracing::info!(order_id = %id, "Order deleted");
    Ok(Json(json!({ "message": "Order deleted" })))
}

/// Download matching orders as an `.xlsx` workbook.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn export(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<AdminOrderQuery>,
) -> Result<impl IntoResponse, AppError> {
    let orders = OrderRepository::new(state.pool())
        .export(&query.filter())
        .await?;
    let workbook = orders_workbook(&orders)?;
    tracing::info!(rows = orders.len(), "Orders exported");

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export_file_name(Utc::now())),
            ),
        ],
        workbook,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_filter() {
        let query: AdminOrderQuery =
            serde_json::from_str(r##"{"status":"shipping","search":" #42 "}"##).unwrap();
        let filter = query.filter();
        assert_eq!(filter.status, Some(OrderStatus::Shipping));
        assert_eq!(filter.search.as_deref(), Some("#42"));
    }

    #[test]
    fn test_change_status_request() {
        let req: ChangeStatusRequest = serde_json::from_str(r#"{"status":"cancelled"}"#).unwrap();
        assert_eq!(req.status, OrderStatus::Cancelled);
        assert!(serde_json::from_str::<ChangeStatusRequest>(r#"{"status":"lost"}"#).is_err());
    }
}
