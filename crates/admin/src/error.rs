//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Server-side failures are
//! captured to Sentry and logged; the client always gets a JSON body with an
//! `error` message, a `code`, and sometimes `details`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use marketstall_core::validation::ValidationError;

use crate::db::{RepositoryError, StatusChangeError, StockChangeError};
use crate::services::{AuthError, StorageError};

/// Application-level error type for admin.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Image upload rejected or storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A stock change was refused.
    #[error(transparent)]
    Stock(StockChangeError),

    /// An order status change was refused.
    #[error(transparent)]
    Transition(StatusChangeError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The admin may not perform this action.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<StockChangeError> for AppError {
    fn from(e: StockChangeError) -> Self {
        match e {
            StockChangeError::Repository(e) => Self::Database(e),
            other => Self::Stock(other),
        }
    }
}

impl From<StatusChangeError> for AppError {
    fn from(e: StatusChangeError) -> Self {
        match e {
            StatusChangeError::Repository(e) => Self::Database(e),
            other => Self::Transition(other),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_))
            | Self::Stock(StockChangeError::WouldGoNegative { .. })
            | Self::Transition(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            Self::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) | Self::BadRequest(_) | Self::Stock(_) => StatusCode::BAD_REQUEST,
            Self::Storage(StorageError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Storage(StorageError::UnsupportedType(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Storage(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::BAD_GATEWAY,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => "not_found",
            Self::Database(RepositoryError::Conflict(_)) => "conflict",
            Self::Database(_) | Self::Session(_) | Self::Auth(_) => "internal",
            Self::Validation(_)
            | Self::BadRequest(_)
            | Self::Stock(StockChangeError::Negative | StockChangeError::TooLarge { .. }) => {
                "invalid_input"
            }
            Self::Stock(_) => "insufficient_stock",
            Self::Transition(_) => "invalid_transition",
            Self::Storage(StorageError::TooLarge { .. }) => "image_too_large",
            Self::Storage(e) if e.is_client_error() => "invalid_image",
            Self::Storage(_) => "storage_unavailable",
            Self::Forbidden(_) => "forbidden",
        }
    }

    /// Client-facing message. Internal details are never exposed.
    fn message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_owned(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Session(_) => "Internal server error".to_owned(),
            Self::Auth(AuthError::InvalidCredentials) => "Invalid credentials".to_owned(),
            Self::Auth(_) => "Authentication error".to_owned(),
            Self::Storage(e) if !e.is_client_error() => "Image storage unavailable".to_owned(),
            _ => self.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::Validation(e) => Some(json!({ "field": e.field() })),
            Self::Stock(
                StockChangeError::WouldGoNegative { current, delta }
                | StockChangeError::TooLarge { current, delta },
            ) => Some(json!({ "current": current, "delta": delta })),
            Self::Transition(StatusChangeError::InvalidTransition { from, to }) => {
                Some(json!({ "from": from, "to": to }))
            }
            Self::Storage(StorageError::TooLarge { max, .. }) => Some(json!({ "max_bytes": max })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut body = json!({
            "error": self.message(),
            "code": self.code(),
        });
        if let (Some(details), Some(obj)) = (self.details(), body.as_object_mut()) {
            obj.insert("details".to_owned(), details);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Record an admin action as a Sentry breadcrumb.
pub fn add_breadcrumb(category: &str, message: &str) {
    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marketstall_core::OrderStatus;

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_conflict_message_is_shown() {
        let (status, body) = body_json(AppError::Database(RepositoryError::Conflict(
            "archive it instead".to_owned(),
        )))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "archive it instead");
    }

    #[tokio::test]
    async fn test_invalid_transition() {
        let err: AppError = StatusChangeError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        }
        .into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "invalid_transition");
        assert_eq!(body["details"]["from"], "delivered");
        assert_eq!(body["details"]["to"], "pending");
    }

    #[tokio::test]
    async fn test_stock_errors() {
        let (status, body) = body_json(
            StockChangeError::WouldGoNegative {
                current: 2,
                delta: -5,
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["details"]["current"], 2);

        let (status, _) = body_json(StockChangeError::Negative.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = body_json(
            StockChangeError::TooLarge {
                current: 10,
                delta: i32::MAX,
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
        assert_eq!(body["details"]["current"], 10);

        let (status, _) =
            body_json(StockChangeError::Repository(RepositoryError::NotFound).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_storage_errors() {
        let (status, body) = body_json(AppError::Storage(StorageError::TooLarge {
            size: 6_000_000,
            max: 5_242_880,
        }))
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["details"]["max_bytes"], 5_242_880);

        let (status, _) =
            body_json(AppError::Storage(StorageError::UnsupportedType("text/html".into()))).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let (status, body) = body_json(AppError::Storage(StorageError::Status {
            status: 500,
            key: "products/1/x.png".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Image storage unavailable");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) =
            body_json(AppError::Database(RepositoryError::DataCorruption("x".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}
