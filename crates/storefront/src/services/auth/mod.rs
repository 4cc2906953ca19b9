//! Authentication service.
//!
//! Password registration and login against `shop.user`.

mod error;

pub use error::AuthError;

use sqlx::PgPool;

use marketstall_core::password::{self, PasswordError};
use marketstall_core::{Email, validation};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::Invalid` if the password or display name is rejected.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validation::password(password)?;
        let display_name = display_name
            .filter(|n| !n.trim().is_empty())
            .map(validation::display_name)
            .transpose()?;

        let password_hash =
            password::hash_password(password).map_err(|_| AuthError::PasswordHash)?;

        let user = self
            .users
            .create(&email, &password_hash, display_name.as_deref())
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// Unknown emails and wrong passwords are indistinguishable to the caller.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some(credentials) = self.users.get_credentials(&email).await? else {
            let _ = password::verify_against_dummy(password);
            return Err(AuthError::InvalidCredentials);
        };

        password::verify_password(password, &credentials.password_hash).map_err(|e| match e {
            PasswordError::Mismatch => AuthError::InvalidCredentials,
            PasswordError::Hash => AuthError::PasswordHash,
        })?;

        Ok(credentials.user)
    }
}
