//! HTTP route handlers for the shop API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (strict rate limit)
//! POST /api/auth/register          - Create an account, email an OTP
//! POST /api/auth/verify-otp        - Verify the OTP, returns a token
//! POST /api/auth/resend-otp        - Send a fresh OTP (60 s cooldown)
//! POST /api/auth/login             - Email + password, returns a token
//! POST /api/auth/logout            - Revoke the current token
//! POST /api/auth/forgot-password   - Email a password reset OTP
//! POST /api/auth/reset-password    - Set a new password with the OTP
//! GET  /api/auth/google/redirect   - Start Google sign-in
//! GET  /api/auth/google/callback   - Finish Google sign-in
//!
//! # Account (auth)
//! GET  /api/user                   - Current profile
//! PUT  /api/user                   - Update profile
//! PUT  /api/user/password          - Change password
//!
//! # Catalog
//! GET  /api/categories             - Categories with product counts
//! GET  /api/categories/{slug}      - One category
//! GET  /api/products               - Search, filter, sort, paginate
//! GET  /api/products/{id}          - Product detail
//! GET  /api/products/{id}/related  - Same-category products
//! GET  /api/products/{id}/reviews  - Product reviews
//! POST /api/products/{id}/reviews  - Review a purchased product (auth)
//! PUT  /api/reviews/{id}           - Edit own review (auth)
//! DELETE /api/reviews/{id}         - Delete own review (auth)
//!
//! # Cart and checkout (auth)
//! GET|POST|DELETE /api/cart        - Show, add, clear
//! PUT|DELETE /api/cart/{item_id}   - Set quantity, remove
//! POST /api/coupons/validate       - Quote a coupon against the cart
//! GET|POST /api/orders             - History, place an order
//! GET  /api/orders/{id}            - Order detail
//! POST /api/orders/{id}/cancel     - Cancel a pending order
//!
//! # Assistant
//! POST /api/chatbot                - Ask about the catalog
//!
//! # Admin
//! /api/admin/*                     - See [`admin`]
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod chatbot;
pub mod coupons;
pub mod google_auth;
pub mod orders;
pub mod reviews;

use axum::Router;

use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Sign-in and account recovery routes.
pub fn auth_routes() -> Router<AppState> {
    auth::router().nest("/google", google_auth::router())
}

/// Everything else under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(catalog::router())
        .merge(reviews::router())
        .nest("/user", account::router())
        .nest("/cart", cart::router())
        .nest("/coupons", coupons::router())
        .nest("/orders", orders::router())
        .nest("/chatbot", chatbot::router())
        .nest("/admin", admin::router())
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .merge(api_routes().layer(api_rate_limiter()))
        .fallback(not_found);

    Router::new().nest("/api", api)
}

/// JSON 404 for unknown API paths.
async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
