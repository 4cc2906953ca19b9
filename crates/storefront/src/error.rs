//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; every error body is JSON with an `error` message
//! and a machine-readable `code`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use marketstall_core::cart::CartError;
use marketstall_core::checkout::CheckoutError;
use marketstall_core::validation::ValidationError;

use crate::db::{CancelOrderError, CartChangeError, PlaceOrderError, RepositoryError};
use crate::services::auth::AuthError;

/// Application-level error type for the storefront.
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

    /// A cart change was refused.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// An order could not be placed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with the resource's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CartChangeError> for AppError {
    fn from(e: CartChangeError) -> Self {
        match e {
            CartChangeError::Rejected(e) => Self::Cart(e),
            CartChangeError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<PlaceOrderError> for AppError {
    fn from(e: PlaceOrderError) -> Self {
        match e {
            PlaceOrderError::Rejected(e) => Self::Checkout(e),
            PlaceOrderError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<CancelOrderError> for AppError {
    fn from(e: CancelOrderError) -> Self {
        match e {
            CancelOrderError::NotCancellable(_) => Self::Conflict(e.to_string()),
            CancelOrderError::Repository(RepositoryError::NotFound) => {
                Self::NotFound("order".to_owned())
            }
            CancelOrderError::Repository(e) => Self::Database(e),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::Invalid(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Cart(err) => match err {
                CartError::ProductUnavailable(_) | CartError::NotInCart(_) => {
                    StatusCode::NOT_FOUND
                }
                CartError::InsufficientStock { .. } => StatusCode::CONFLICT,
                CartError::Quantity(_) => StatusCode::BAD_REQUEST,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::TooManyLines { .. }
                | CheckoutError::Quantity(_)
                | CheckoutError::Amount(_) => StatusCode::BAD_REQUEST,
                CheckoutError::ProductUnavailable { .. }
                | CheckoutError::InsufficientStock { .. }
                | CheckoutError::PricesChanged(_)
                | CheckoutError::TotalChanged { .. } => StatusCode::CONFLICT,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => "not_found",
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => "conflict",
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => "internal",
            Self::Auth(AuthError::InvalidCredentials) => "invalid_credentials",
            Self::Auth(AuthError::UserAlreadyExists) => "email_taken",
            Self::Auth(AuthError::Invalid(_) | AuthError::InvalidEmail(_))
            | Self::Validation(_)
            | Self::BadRequest(_) => "invalid_input",
            Self::Auth(_) => "internal",
            Self::Cart(CartError::ProductUnavailable(_)) => "product_unavailable",
            Self::Cart(CartError::NotInCart(_)) => "not_in_cart",
            Self::Cart(CartError::InsufficientStock { .. })
            | Self::Checkout(CheckoutError::InsufficientStock { .. }) => "insufficient_stock",
            Self::Cart(CartError::Quantity(_)) | Self::Checkout(CheckoutError::Quantity(_)) => {
                "invalid_quantity"
            }
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => "empty_cart",
                CheckoutError::TooManyLines { .. } => "too_many_lines",
                CheckoutError::ProductUnavailable { .. } => "product_unavailable",
                CheckoutError::PricesChanged(_) => "prices_changed",
                CheckoutError::TotalChanged { .. } => "total_changed",
                _ => "invalid_input",
            },
        }
    }

    /// Client-facing message. Internal details are never exposed.
    fn message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_owned(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_owned()
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_owned(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_owned()
                }
                AuthError::Invalid(e) => e.to_string(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_owned(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_owned()
                }
            },
            _ => self.to_string(),
        }
    }

    /// Structured details for errors the client can act on.
    fn details(&self) -> Option<Value> {
        match self {
            Self::Validation(e) | Self::Auth(AuthError::Invalid(e)) => {
                Some(json!({ "field": e.field() }))
            }
            Self::Cart(CartError::InsufficientStock { available }) => {
                Some(json!({ "available": available }))
            }
            Self::Checkout(CheckoutError::InsufficientStock {
                product_id,
                requested,
                available,
                ..
            }) => Some(json!({
                "product_id": product_id,
                "requested": requested,
                "available": available,
            })),
            Self::Checkout(CheckoutError::ProductUnavailable { product_id }) => {
                Some(json!({ "product_id": product_id }))
            }
            Self::Checkout(CheckoutError::PricesChanged(changes)) => {
                Some(json!({ "changes": changes }))
            }
            Self::Checkout(CheckoutError::TotalChanged { expected, actual }) => {
                Some(json!({ "expected": expected, "actual": actual }))
            }
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
///
/// Call this after successful authentication to associate errors with users.
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

/// Add a breadcrumb for a shopper action.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marketstall_core::checkout::PriceChange;
    use marketstall_core::{Money, ProductId};

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) =
            body_json(AppError::Database(RepositoryError::DataCorruption("x".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["code"], "internal");
    }

    #[tokio::test]
    async fn test_repository_not_found_is_404() {
        let (status, _) = body_json(AppError::Database(RepositoryError::NotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_error_names_field() {
        let (status, body) =
            body_json(AppError::Validation(ValidationError::Required { field: "name" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "name");
    }

    #[tokio::test]
    async fn test_price_change_lists_changes() {
        let change = PriceChange {
            product_id: ProductId::new(4),
            name: "Fig Jam".to_owned(),
            expected: Money::parse("3.00").unwrap(),
            current: Money::parse("3.50").unwrap(),
        };
        let (status, body) =
            body_json(AppError::Checkout(CheckoutError::PricesChanged(vec![change]))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "prices_changed");
        assert_eq!(body["details"]["changes"][0]["product_id"], 4);
        assert_eq!(body["details"]["changes"][0]["current"], "3.50");
    }

    #[tokio::test]
    async fn test_cart_stock_conflict() {
        let (status, body) =
            body_json(AppError::Cart(CartError::InsufficientStock { available: 2 })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["details"]["available"], 2);
    }

    #[tokio::test]
    async fn test_wrong_password_is_401() {
        let (status, body) = body_json(AppError::Auth(AuthError::InvalidCredentials)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "invalid_credentials");
    }
}
