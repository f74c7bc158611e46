//! HTTP tests for the admin API.
//!
//! These tests require:
//! - A migrated and seeded database
//! - An admin account (`sm-cli admin create ...`) whose credentials are in
//!   `SHOP_TEST_ADMIN_EMAIL` / `SHOP_TEST_ADMIN_PASSWORD`
//! - The API server running
//!
//! Auth endpoints allow a burst of five requests per IP, so everything that
//! needs an admin token shares one login.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use senmarket_integration_tests::TestContext;

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_admin_routes_reject_anonymous() {
    let ctx = TestContext::new();

    let resp = ctx.get("/api/admin/dashboard").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server and admin credentials"]
async fn test_admin_workflow() {
    let ctx = TestContext::new();
    let token = ctx.admin_token().await;

    // Dashboard
    let resp = ctx
        .get("/api/admin/dashboard")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let dashboard: Value = resp.json().await.unwrap();
    assert!(dashboard["users"].as_i64().unwrap() >= 1);
    assert_eq!(dashboard["orders_by_status"].as_array().unwrap().len(), 5);
    assert!(dashboard["revenue_formatted"].as_str().unwrap().ends_with('₫'));

    // Coupon lifecycle
    let code = format!("IT{}", uuid::Uuid::new_v4().simple())
        .chars()
        .take(12)
        .collect::<String>();
    let resp = ctx
        .client
        .post(ctx.url("/api/admin/coupons"))
        .bearer_auth(&token)
        .json(&json!({
            "code": code.to_lowercase(),
            "kind": "fixed",
            "value": "25000",
            "min_order_amount": "100000"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let coupon: Value = resp.json().await.unwrap();
    assert_eq!(coupon["code"], code.to_uppercase());
    let coupon_id = coupon["id"].as_i64().unwrap();

    let resp = ctx
        .client
        .post(ctx.url("/api/admin/coupons"))
        .bearer_auth(&token)
        .json(&json!({ "code": code, "kind": "fixed", "value": "25000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = ctx
        .client
        .patch(ctx.url(&format!("/api/admin/coupons/{coupon_id}/toggle")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let toggled: Value = resp.json().await.unwrap();
    assert_eq!(toggled["is_active"], false);

    let resp = ctx
        .client
        .delete(ctx.url(&format!("/api/admin/coupons/{coupon_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Invalid product input
    let resp = ctx
        .client
        .post(ctx.url("/api/admin/products"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Giá sai", "price": "100000", "sale_price": "150000", "stock": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = resp.json().await.unwrap();
    assert!(body["errors"]["sale_price"].is_array());

    // Order export
    let resp = ctx
        .get("/api/admin/orders/export?status=completed")
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains(".xlsx"));
    let bytes = resp.bytes().await.unwrap();
    // xlsx files are zip archives
    assert_eq!(&bytes[..2], b"PK");
}
