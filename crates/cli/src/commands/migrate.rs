//! Database migration command.
//!
//! Applies `migrations/` at the workspace root, then creates the session
//! tables for both binaries:
//!
//! - `tower_sessions.session` (storefront)
//! - `tower_sessions.admin_session` (admin)

use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

use super::{ConnectError, connect};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid session table: {0}")]
    SessionStore(String),
}

/// Run all migrations.
///
/// # Errors
///
/// Returns an error if the connection or any migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running schema migrations...");
    sqlx::migrate!("../../migrations").run(&pool).await?;

    tracing::info!("Creating storefront session table...");
    PostgresStore::new(pool.clone()).migrate().await?;

    tracing::info!("Creating admin session table...");
    marketstall_admin::middleware::session_store(pool)
        .map_err(MigrationError::SessionStore)?
        .migrate()
        .await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
