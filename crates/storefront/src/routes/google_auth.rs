//! Google sign-in.
//!
//! 1. The frontend calls `/redirect` and sends the browser to the returned URL.
//! 2. Google redirects back to `/callback` with `code` and `state`.
//! 3. The callback checks `state` against the session, signs the user in and
//!    redirects to `{frontend}/auth/callback?token=...` (or `?error=...`).

use axum::{
    Json, Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::session::keys;
use crate::services::auth::AuthError;
use crate::services::google::GoogleClient;
use crate::state::AppState;

/// Build the Google sign-in router (mounted at `/api/auth/google`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/redirect", get(redirect))
        .route("/callback", get(callback))
}

/// Query parameters Google appends to the callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn google(state: &AppState) -> Result<&GoogleClient, AppError> {
    state
        .google()
        .ok_or_else(|| AppError::ServiceUnavailable("Google sign-in is not configured".to_string()))
}

/// Random CSRF state for one sign-in attempt.
fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Where the browser lands after the callback.
fn frontend_callback(frontend_url: &str, outcome: Result<&str, &str>) -> String {
    let (key, value) = match outcome {
        Ok(token) => ("token", token),
        Err(error) => ("error", error),
    };
    url::Url::parse_with_params(&format!("{frontend_url}/auth/callback"), &[(key, value)])
        .map_or_else(|_| format!("{frontend_url}/auth/callback"), String::from)
}

/// Start a sign-in: remember a CSRF state and return Google's consent URL.
#[instrument(skip(state, session))]
pub async fn redirect(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, AppError> {
    let client = google(&state)?;

    let csrf = generate_state();
    session
        .insert(keys::GOOGLE_OAUTH_STATE, &csrf)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    Ok(Json(json!({ "url": client.authorization_url(&csrf) })))
}

/// Finish a sign-in and hand the token to the frontend.
#[instrument(skip(state, session, query))]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, AppError> {
    let client = google(&state)?;
    let frontend = state.config().frontend_url.clone();

    let expected: Option<String> = session
        .remove(keys::GOOGLE_OAUTH_STATE)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    if let Some(error) = query.error.as_deref() {
        tracing::info!(error, "Google sign-in cancelled");
        return Ok(Redirect::to(&frontend_callback(&frontend, Err("cancelled"))));
    }

    let (Some(code), Some(returned)) = (query.code.as_deref(), query.state.as_deref()) else {
        return Err(AppError::BadRequest("Missing code or state".to_string()));
    };
    if expected.as_deref() != Some(returned) {
        tracing::warn!("Google sign-in state mismatch");
        return Ok(Redirect::to(&frontend_callback(&frontend, Err("invalid_state"))));
    }

    let access_token = client.exchange_code(code).await?;
    let profile = client.fetch_profile(&access_token).await?;

    match state.auth().login_with_google(&profile).await {
        Ok(issued) => {
            tracing::info!(user_id = %issued.user.id, "Signed in with Google");
            Ok(Redirect::to(&frontend_callback(&frontend, Ok(&issued.token))))
        }
        Err(AuthError::AccountBanned) => {
            Ok(Redirect::to(&frontend_callback(&frontend, Err("account_banned"))))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_state_is_unique() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 22);
        assert_ne!(a, b);
    }

    #[test]
    fn test_frontend_callback() {
        assert_eq!(
            frontend_callback("http://localhost:5173", Ok("abc_DEF-1")),
            "http://localhost:5173/auth/callback?token=abc_DEF-1"
        );
        assert_eq!(
            frontend_callback("https://senmarket.vn", Err("account_banned")),
            "https://senmarket.vn/auth/callback?error=account_banned"
        );
    }
}
