//! Account queries and the admin flag.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use marketstall_core::{search, Email, Page, Paginated, UserId};

use super::RepositoryError;
use crate::models::{User, UserDetail};

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
            RepositoryError::DataCorruption(format!("invalid email for user {}: {e}", row.id))
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

/// An account together with the stored password hash, for login.
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

/// User list filters.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive substring of the email.
    pub q: Option<String>,
}

impl UserFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(q) = &self.q {
            qb.push(" WHERE u.email ILIKE ")
                .push_bind(search::contains_pattern(&q.to_lowercase()));
        }
    }
}

const SELECT_USER: &str = r#"
    SELECT u.id, u.email, p.display_name,
           COALESCE(p.is_admin, FALSE) AS is_admin,
           u.created_at,
           COALESCE(p.updated_at, u.updated_at) AS updated_at
    FROM shop."user" u
    LEFT JOIN shop.profile p ON p.user_id = u.id
"#;

/// Repository for account operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(User::try_from)
            .transpose()
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

    /// Whether the account exists and currently holds the admin flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_admin(&self, id: UserId) -> Result<bool, RepositoryError> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT is_admin FROM shop.profile WHERE user_id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(flag.unwrap_or(false))
    }

    /// List accounts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &UserFilter,
        page: Page,
    ) -> Result<Paginated<User>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(r#"SELECT COUNT(*) FROM shop."user" u"#);
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(SELECT_USER);
        filter.push_where(&mut qb);
        qb.push(" ORDER BY u.created_at DESC, u.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let users = qb
            .build_query_as::<UserRow>()
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Paginated::new(users, page, total))
    }

    /// A user with the number of orders they placed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detail(&self, id: UserId) -> Result<Option<UserDetail>, RepositoryError> {
        let Some(user) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let order_count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM shop."order" WHERE user_id = $1"#)
                .bind(id)
                .fetch_one(self.pool)
                .await?;

        Ok(Some(UserDetail { user, order_count }))
    }

    /// Grant or revoke the admin flag.
    ///
    /// Creates the profile row if the account never had one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO shop.profile (user_id, is_admin)
            SELECT id, $2 FROM shop."user" WHERE id = $1
            ON CONFLICT (user_id)
            DO UPDATE SET is_admin = EXCLUDED.is_admin, updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(is_admin)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }
}
