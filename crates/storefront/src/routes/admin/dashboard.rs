//! Dashboard statistics.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tracing::instrument;

use senmarket_core::format_vnd;

use crate::db::{
    DashboardRepository, OrderRepository, PageRequest,
    dashboard::{DashboardTotals, StatusCount, TopProduct},
    orders::OrderFilter,
};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::OrderListEntry;
use crate::state::AppState;

/// Orders and products shown in the "latest" and "best sellers" panels.
const PANEL_SIZE: i64 = 5;

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(show))
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub totals: DashboardTotals,
    pub revenue_formatted: String,
    pub orders_by_status: Vec<StatusCount>,
    pub latest_orders: Vec<OrderListEntry>,
    pub top_products: Vec<TopProduct>,
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<Dashboard>, AppError> {
    let dashboard = DashboardRepository::new(state.pool());
    let totals = dashboard.totals().await?;
    let orders_by_status = dashboard.orders_by_status().await?;
    let top_products = dashboard.top_products(PANEL_SIZE).await?;
    let (latest_orders, _) = OrderRepository::new(state.pool())
        .list(
            &OrderFilter::default(),
            PageRequest::new(Some(1), Some(PANEL_SIZE)),
        )
        .await?;

    Ok(Json(Dashboard {
        revenue_formatted: format_vnd(totals.revenue),
        totals,
        orders_by_status,
        latest_orders,
        top_products,
    }))
}
