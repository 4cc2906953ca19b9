//! Customer and admin accounts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marketstall_core::{Email, UserId};

/// An account joined with its profile.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An account with activity counts.
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub order_count: i64,
}
