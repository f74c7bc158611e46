//! Session middleware configuration.
//!
//! The API itself is stateless (bearer tokens). Sessions only carry the
//! CSRF `state` of a Google sign-in between the redirect and the callback,
//! so they are short-lived and stored in `PostgreSQL` via tower-sessions.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "sm_session";

/// Session keys.
pub mod keys {
    /// CSRF state of the pending Google sign-in.
    pub const GOOGLE_OAUTH_STATE: &str = "google_oauth_state";
}

/// A sign-in must complete within 15 minutes.
const SESSION_EXPIRY_SECONDS: i64 = 15 * 60;

/// Create the session layer with `PostgreSQL` store.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    // The tower_sessions.session table is created by migration
    let store = PostgresStore::new(pool.clone());

    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        // Google redirects back with a top-level GET, which Lax allows
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/api/auth/google")
}
