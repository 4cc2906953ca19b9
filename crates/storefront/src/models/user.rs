//! Shopper account types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marketstall_core::{Email, UserId};

/// A shopper account joined with its profile.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email (lower-cased).
    pub email: Email,
    /// Name shown on the account page.
    pub display_name: Option<String>,
    /// Whether this account may use the admin API.
    pub is_admin: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
}
