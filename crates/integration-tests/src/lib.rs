//! Integration tests for SenMarket.
//!
//! # Running Tests
//!
//! ```bash
//! # Pricing scenarios (no server needed)
//! cargo test -p senmarket-integration-tests
//!
//! # HTTP tests against a running, migrated and seeded API
//! sm-cli migrate && sm-cli seed
//! sm-cli admin create -e admin@senmarket.test -n Admin -p admin-password
//! cargo run -p senmarket-storefront &
//! cargo test -p senmarket-integration-tests -- --ignored
//! ```
//!
//! # Environment
//!
//! - `SHOP_TEST_BASE_URL` - API under test (default: `http://localhost:8000`)
//! - `SHOP_TEST_ADMIN_EMAIL`, `SHOP_TEST_ADMIN_PASSWORD` - Admin credentials
//!   for the admin tests

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};

/// Base URL of the API under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("SHOP_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// Shared state for HTTP tests.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: base_url(),
        }
    }

    /// Absolute URL for an API path such as `/api/products`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    #[must_use]
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    /// Log in and return the bearer token.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the credentials are rejected.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let resp = self
            .post("/api/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request failed");
        assert_eq!(resp.status(), StatusCode::OK, "login rejected for {email}");

        let body: Value = resp.json().await.expect("login response is not JSON");
        body["token"]
            .as_str()
            .expect("login response has no token")
            .to_string()
    }

    /// Token for the admin configured in the environment.
    ///
    /// # Panics
    ///
    /// Panics if the admin credentials are not set or rejected.
    pub async fn admin_token(&self) -> String {
        let email = std::env::var("SHOP_TEST_ADMIN_EMAIL").expect("SHOP_TEST_ADMIN_EMAIL not set");
        let password =
            std::env::var("SHOP_TEST_ADMIN_PASSWORD").expect("SHOP_TEST_ADMIN_PASSWORD not set");
        self.login(&email, &password).await
    }
}

/// A unique address for accounts created by a test run.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@senmarket.test", uuid::Uuid::new_v4().simple())
}
