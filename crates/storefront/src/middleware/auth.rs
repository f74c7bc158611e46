//! Bearer-token authentication extractors.
//!
//! Clients send `Authorization: Bearer <token>` with the token returned by
//! login, OTP verification or Google sign-in.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use senmarket_core::AccessTokenId;

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::auth::AuthError;
use crate::state::AppState;

/// The authenticated user and the token they presented.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Token used for this request; logout revokes exactly this one.
    pub token_id: AccessTokenId,
    pub user: User,
}

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(current): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", current.user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that optionally gets the current user.
///
/// A missing header yields `None`; a header with a bad token is still
/// rejected so clients notice expired sessions.
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Extractor that requires an administrator.
pub struct RequireAdmin(pub CurrentUser);

/// Pull the token out of `Authorization: Bearer ...`.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn resolve(state: &AppState, token: &str) -> Result<CurrentUser, AppError> {
    let (token_id, user) = state.auth().authenticate(token).await.map_err(|e| match e {
        AuthError::InvalidToken => AppError::Unauthorized("Invalid or expired token".to_string()),
        other => other.into(),
    })?;

    if user.is_banned() {
        return Err(AppError::Forbidden("Account is banned".to_string()));
    }

    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(CurrentUser { token_id, user })
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Unauthenticated".to_string()))?;
        Ok(Self(resolve(state, token).await?))
    }
}

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => Ok(Self(Some(resolve(state, token).await?))),
            None => Ok(Self(None)),
        }
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(current) = RequireAuth::from_request_parts(parts, state).await?;
        if !current.user.is_admin() {
            return Err(AppError::Forbidden("Administrator access required".to_string()));
        }
        Ok(Self(current))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/user");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc123"))), Some("abc123"));
        assert_eq!(bearer_token(&parts(Some("bearer  abc123 "))), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_rejects_other_schemes() {
        assert_eq!(bearer_token(&parts(None)), None);
        assert_eq!(bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer"))), None);
    }
}
