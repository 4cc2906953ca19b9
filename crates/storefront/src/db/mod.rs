//! Database operations for the storefront.
//!
//! # Schema: `shop`
//!
//! The storefront reads and writes:
//!
//! - `shop.user` / `shop.profile` - Shopper accounts
//! - `shop.product` - Catalog (read-only here; stock is decremented at checkout)
//! - `shop.cart_item` - One row per (user, product)
//! - `shop.order` / `shop.order_item` - Placed orders
//! - `tower_sessions.session` - Session storage
//!
//! # Migrations
//!
//! Migrations live in the workspace `migrations/` directory and run via:
//! ```bash
//! cargo run -p marketstall-cli -- migrate
//! ```

pub mod cart;
pub mod orders;
pub mod products;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart::{CartChangeError, CartRepository};
pub use orders::{CancelOrderError, CheckoutSource, OrderRepository, PlaceOrderError};
pub use products::{ProductFilter, ProductRepository, ProductSort};
pub use users::{Credentials, UserRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A failure from a load shared with other callers.
    #[error(transparent)]
    Shared(Arc<RepositoryError>),
}

impl RepositoryError {
    /// Map unique-violation errors to `Conflict`, everything else to `Database`.
    pub(crate) fn from_unique(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
