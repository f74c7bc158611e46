//! Account management.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use senmarket_core::{UserId, UserRole, UserStatus};

use crate::db::{AccessTokenRepository, PageRequest, UserRepository, users::UserFilter};
use crate::error::AppError;
use crate::middleware::{CurrentUser, RequireAdmin};
use crate::models::{Paginated, User};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(show).delete(remove))
        .route("/{id}/role", patch(toggle_role))
        .route("/{id}/status", patch(toggle_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl UserListQuery {
    fn filter(&self) -> UserFilter {
        UserFilter {
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            role: self.role,
            status: self.status,
        }
    }
}

/// Admins may not demote, ban or delete their own account.
fn forbid_self(admin: &CurrentUser, target: UserId) -> Result<(), AppError> {
    if admin.user.id == target {
        return Err(AppError::Unprocessable(
            "You cannot perform this action on your own account".to_string(),
        ));
    }
    Ok(())
}

async fn load(state: &AppState, id: UserId) -> Result<User, AppError> {
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Paginated<User>>, AppError> {
    let page = PageRequest::new(query.page, query.per_page);
    let (users, total) = UserRepository::new(state.pool())
        .list(&query.filter(), page)
        .await?;
    Ok(Json(Paginated::new(users, total, page)))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    load(&state, id).await.map(Json)
}

/// Switch between customer and admin.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn toggle_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    forbid_self(&admin, id)?;
    let user = load(&state, id).await?;

    let user = UserRepository::new(state.pool())
        .set_role(id, user.role.toggled())
        .await?;
    tracing::info!(user_id = %id, role = %user.role, "User role changed");
    Ok(Json(user))
}

/// Ban or unban. Banning signs the user out everywhere.
#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn toggle_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    forbid_self(&admin, id)?;
    let user = load(&state, id).await?;

    let user = UserRepository::new(state.pool())
        .set_status(id, user.status.toggled())
        .await?;
    if user.is_banned() {
        let revoked = AccessTokenRepository::new(state.pool())
            .revoke_all_for_user(id)
            .await?;
        tracing::info!(user_id = %id, revoked, "User banned");
    } else {
        tracing::info!(user_id = %id, "User unbanned");
    }
    Ok(Json(user))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<Value>, AppError> {
    forbid_self(&admin, id)?;
    UserRepository::new(state.pool()).delete(id).await?;
    tracing::info!(user_id = %id, "User deleted");
    Ok(Json(json!({ "message": "User deleted" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_filter() {
        let query: UserListQuery =
            serde_json::from_str(r#"{"search":"  ","role":"admin","status":"banned"}"#).unwrap();
        let filter = query.filter();
        assert_eq!(filter.search, None);
        assert_eq!(filter.role, Some(UserRole::Admin));
        assert_eq!(filter.status, Some(UserStatus::Banned));
    }
}
