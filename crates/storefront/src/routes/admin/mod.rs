//! Back-office API.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin), so
//! non-admin tokens are rejected with 403 before any work is done.
//!
//! ```text
//! GET    /api/admin/dashboard
//!
//! GET    /api/admin/users               ?search&role&status&page
//! GET    /api/admin/users/{id}
//! DELETE /api/admin/users/{id}
//! PATCH  /api/admin/users/{id}/role
//! PATCH  /api/admin/users/{id}/status
//!
//! GET    /api/admin/categories
//! POST   /api/admin/categories
//! PUT    /api/admin/categories/{id}
//! DELETE /api/admin/categories/{id}
//!
//! GET    /api/admin/products            ?search&category&sort&page
//! POST   /api/admin/products
//! GET    /api/admin/products/{id}
//! PUT    /api/admin/products/{id}
//! DELETE /api/admin/products/{id}
//! PATCH  /api/admin/products/{id}/toggle
//! POST   /api/admin/uploads             multipart `file`
//!
//! GET    /api/admin/orders              ?status&search&page
//! GET    /api/admin/orders/export       ?status&search
//! GET    /api/admin/orders/{id}
//! DELETE /api/admin/orders/{id}
//! PATCH  /api/admin/orders/{id}/status
//!
//! GET    /api/admin/coupons             ?search&page
//! POST   /api/admin/coupons
//! GET    /api/admin/coupons/{id}
//! PUT    /api/admin/coupons/{id}
//! DELETE /api/admin/coupons/{id}
//! PATCH  /api/admin/coupons/{id}/toggle
//!
//! GET    /api/admin/reviews             ?product_id&page
//! DELETE /api/admin/reviews/{id}
//! ```

pub mod categories;
pub mod coupons;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod uploads;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the admin router (mounted at `/api/admin`).
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(dashboard::router())
        .nest("/users", users::router())
        .nest("/categories", categories::router())
        .nest("/products", products::router())
        .nest("/uploads", uploads::router())
        .nest("/orders", orders::router())
        .nest("/coupons", coupons::router())
        .nest("/reviews", reviews::router())
}
