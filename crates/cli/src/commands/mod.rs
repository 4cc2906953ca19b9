//! Command implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;

/// Environment variable holding the connection string.
const DATABASE_URL: &str = "DATABASE_URL";

/// Connect using `DATABASE_URL`.
///
/// # Errors
///
/// Returns `MissingEnvVar` if the variable is unset, or `Database` if the
/// pool cannot connect.
pub async fn connect() -> Result<PgPool, ConnectError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var(DATABASE_URL)
        .map(SecretString::from)
        .map_err(|_| ConnectError::MissingEnvVar(DATABASE_URL))?;

    tracing::info!("Connecting to database...");
    Ok(marketstall_admin::db::create_pool(&database_url).await?)
}

/// Errors from opening the database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Could not connect.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}
