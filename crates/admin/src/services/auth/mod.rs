//! Admin authentication.
//!
//! Admins log in with the same email and password as their shop account;
//! the account must carry the admin flag. Non-admins are told their
//! credentials are invalid, so the endpoint does not reveal which accounts
//! exist.

mod error;

pub use error::AuthError;

use sqlx::PgPool;

use marketstall_core::Email;
use marketstall_core::password::{self, PasswordError};

use crate::db::UserRepository;
use crate::models::User;

/// Authentication service for admin.
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

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// or the account is not an admin.
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

        if !credentials.user.is_admin {
            tracing::warn!(user_id = %credentials.user.id, "non-admin attempted admin login");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(credentials.user)
    }
}
