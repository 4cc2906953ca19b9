//! Authentication extractors for admin.
//!
//! The session only remembers who logged in. [`RequireAdmin`] re-reads the
//! admin flag on every request, so revoking it takes effect immediately.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::db::UserRepository;
use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

/// Extractor that requires a logged-in admin.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAdmin(admin): RequireAdmin) -> impl IntoResponse {
///     format!("Hello, {}!", admin.email)
/// }
/// ```
pub struct RequireAdmin(pub CurrentAdmin);

/// Why the request was refused.
#[derive(Debug)]
pub enum AdminRejection {
    /// Nobody is logged in.
    Unauthorized,
    /// The account is no longer an admin.
    Forbidden,
    /// The admin flag could not be checked.
    Unavailable,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "authentication required"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "admin access required"),
            Self::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "please try again"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AdminRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let OptionalAdmin(admin) = OptionalAdmin::from_request_parts(parts, state)
            .await
            .unwrap_or(OptionalAdmin(None));
        let admin = admin.ok_or(AdminRejection::Unauthorized)?;

        let is_admin = UserRepository::new(state.pool())
            .is_admin(admin.id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to check admin flag");
                AdminRejection::Unavailable
            })?;

        if !is_admin {
            tracing::warn!(user_id = %admin.id, "session of revoked admin rejected");
            return Err(AdminRejection::Forbidden);
        }

        Ok(Self(admin))
    }
}

/// Extractor that optionally gets the admin stored in the session, without
/// re-checking the flag.
pub struct OptionalAdmin(pub Option<CurrentAdmin>);

impl<S> FromRequestParts<S> for OptionalAdmin
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(admin))
    }
}

/// Store the logged-in admin, rotating the session ID first.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Log out by discarding the whole session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
