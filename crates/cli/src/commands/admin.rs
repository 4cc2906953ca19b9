//! Admin account management commands.
//!
//! The admin API has no sign-up, so the first admin is created here.

use thiserror::Error;

use marketstall_admin::db::{RepositoryError, UserRepository};
use marketstall_core::password::{PasswordError, hash_password};
use marketstall_core::validation::{self, ValidationError};
use marketstall_core::{Email, EmailError};

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password or display name rejected.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Failed to hash password: {0}")]
    Password(#[from] PasswordError),

    /// User already exists.
    #[error("An account already exists with email: {0}")]
    UserExists(String),

    #[error("No account with email: {0}")]
    UserNotFound(String),
}

/// Create a new account with the admin flag set.
///
/// Returns the ID of the created user.
///
/// # Errors
///
/// Returns `UserExists` if the email is taken, or a validation error for a
/// weak password or bad display name.
pub async fn create_user(
    email: &str,
    password: &str,
    name: Option<&str>,
) -> Result<i32, AdminError> {
    let email = Email::parse(email)?;
    validation::password(password)?;
    let name = name.map(validation::display_name).transpose()?;
    let password_hash = hash_password(password)?;

    let pool = connect().await?;
    let mut tx = pool.begin().await?;

    let user_id: Option<i32> = sqlx::query_scalar(
        r#"
        INSERT INTO shop."user" (email, password_hash)
        VALUES ($1, $2)
        ON CONFLICT (email) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(user_id) = user_id else {
        return Err(AdminError::UserExists(email.to_string()));
    };

    sqlx::query(
        "INSERT INTO shop.profile (user_id, display_name, is_admin) VALUES ($1, $2, TRUE)",
    )
    .bind(user_id)
    .bind(name.as_deref())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(user_id, email = %email, "Admin account created");
    Ok(user_id)
}

/// Grant or revoke the admin flag on an existing account.
///
/// # Errors
///
/// Returns `UserNotFound` if no account has this email.
pub async fn set_admin(email: &str, is_admin: bool) -> Result<(), AdminError> {
    let email = Email::parse(email)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    let credentials = users
        .get_credentials(&email)
        .await?
        .ok_or_else(|| AdminError::UserNotFound(email.to_string()))?;

    let user = users.set_admin(credentials.user.id, is_admin).await?;

    if is_admin {
        tracing::info!(user_id = %user.id, email = %user.email, "Admin access granted");
    } else {
        tracing::info!(user_id = %user.id, email = %user.email, "Admin access revoked");
    }
    Ok(())
}
