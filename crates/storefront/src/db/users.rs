//! User repository for database operations.
//!
//! Shopper accounts live in `shop.user`; display name and the admin flag live
//! in `shop.profile`, created in the same transaction as the user.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use marketstall_core::{Email, UserId};

use super::RepositoryError;
use crate::models::User;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    display_name: Option<String>,
    is_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            display_name: row.display_name,
            is_admin: row.is_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A user together with the stored password hash, for login.
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

const SELECT_USER: &str = r#"
    SELECT u.id, u.email, p.display_name,
           COALESCE(p.is_admin, FALSE) AS is_admin,
           u.created_at,
           COALESCE(p.updated_at, u.updated_at) AS updated_at
    FROM shop."user" u
    LEFT JOIN shop.profile p ON p.user_id = u.id
"#;

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<Credentials>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct CredentialsRow {
            #[sqlx(flatten)]
            user: UserRow,
            password_hash: String,
        }

        let row = sqlx::query_as::<_, CredentialsRow>(
            r#"
            SELECT u.id, u.email, p.display_name,
                   COALESCE(p.is_admin, FALSE) AS is_admin,
                   u.created_at,
                   COALESCE(p.updated_at, u.updated_at) AS updated_at,
                   u.password_hash
            FROM shop."user" u
            LEFT JOIN shop.profile p ON p.user_id = u.id
            WHERE u.email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| {
            Ok(Credentials {
                user: User::try_from(r.user)?,
                password_hash: r.password_hash,
            })
        })
        .transpose()
    }

    /// Create a user and their profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO shop."user" (email, password_hash)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email"))?;

        sqlx::query("INSERT INTO shop.profile (user_id, display_name) VALUES ($1, $2)")
            .bind(id)
            .bind(display_name)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE u.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        User::try_from(row)
    }

    /// Set the display name on a user's profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_display_name(
        &self,
        id: UserId,
        display_name: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO shop.profile (user_id, display_name)
            SELECT id, $2 FROM shop."user" WHERE id = $1
            ON CONFLICT (user_id)
            DO UPDATE SET display_name = EXCLUDED.display_name, updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(display_name)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }
}
