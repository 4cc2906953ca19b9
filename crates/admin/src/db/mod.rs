//! Database operations for admin.
//!
//! # Schema: `shop`
//!
//! Admin shares the storefront's tables and writes to all of them:
//!
//! - `shop.user` / `shop.profile` - Accounts and the admin flag
//! - `shop.product` - Catalog, stock and images
//! - `shop.order` / `shop.order_item` - Status changes and restocking
//! - `tower_sessions.admin_session` - Admin session storage
//!
//! # Migrations
//!
//! ```bash
//! cargo run -p marketstall-cli -- migrate
//! ```

pub mod dashboard;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use dashboard::DashboardRepository;
pub use inventory::{InventoryFilter, InventoryRepository, StockChangeError};
pub use orders::{OrderFilter, OrderRepository, StatusChangeError};
pub use products::{ProductFilter, ProductRepository};
pub use users::{Credentials, UserFilter, UserRepository};

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

    /// Constraint violation (e.g., product still referenced by orders).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
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
