//! Admin login and logout.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::UserRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAdmin, clear_current_admin, set_current_admin};
use crate::models::{CurrentAdmin, User};
use crate::services::AuthService;
use crate::state::AppState;

/// Login request.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Log in with email and password. Only admins succeed.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .login(&req.email, &req.password)
        .await
        .inspect_err(|e| tracing::info!(error = %e, "admin login failed"))?;

    set_current_admin(&session, &CurrentAdmin::from(&user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    tracing::info!(user_id = %user.id, "admin logged in");
    Ok(Json(user))
}

/// End the session.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_admin(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in admin.
#[instrument(skip_all)]
pub async fn me(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<User>> {
    UserRepository::new(state.pool())
        .get_by_id(admin.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("user".to_owned()))
}
