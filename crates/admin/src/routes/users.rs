//! User list and admin flag route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use marketstall_core::{Page, Paginated, UserId};

use crate::db::{UserFilter, UserRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::{User, UserDetail};
use crate::state::AppState;

/// User list query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

/// All accounts, newest first.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<UserQuery>,
    Query(page): Query<Page>,
) -> Result<Json<Paginated<User>>> {
    let filter = UserFilter {
        q: query
            .q
            .map(|q| q.trim().to_owned())
            .filter(|q| !q.is_empty()),
    };
    let users = UserRepository::new(state.pool()).list(&filter, page).await?;
    Ok(Json(users))
}

/// Account detail with order count.
#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<UserDetail>> {
    UserRepository::new(state.pool())
        .get_detail(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("user".to_owned()))
}

/// Grant or revoke the admin flag.
///
/// An admin cannot revoke their own flag, so the last admin cannot lock
/// everyone out by accident.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set_admin(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(req): Json<SetAdminRequest>,
) -> Result<Json<User>> {
    if id == admin.id && !req.is_admin {
        return Err(AppError::Forbidden(
            "cannot revoke your own admin access".to_owned(),
        ));
    }

    let user = UserRepository::new(state.pool())
        .set_admin(id, req.is_admin)
        .await?;

    tracing::info!(user_id = %id, is_admin = req.is_admin, "admin flag changed");
    add_breadcrumb(
        "users",
        &format!("set is_admin={} for user {id}", req.is_admin),
    );
    Ok(Json(user))
}
