//! Session middleware configuration for admin.
//!
//! Admin sessions live in their own table, `tower_sessions.admin_session`,
//! so a storefront cookie can never be replayed against the admin API. The
//! cookie is signed, `SameSite=Strict` and expires after 8 hours idle.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use tower_sessions::cookie::{Key, KeyError};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AdminConfig;

/// Session cookie name for admin.
pub const SESSION_COOKIE_NAME: &str = "ms_admin_session";

/// Schema holding the session tables.
pub const SESSION_SCHEMA: &str = "tower_sessions";

/// Admin session table.
pub const SESSION_TABLE: &str = "admin_session";

/// Session expiry time in seconds (8 hours).
const SESSION_EXPIRY_SECONDS: i64 = 8 * 60 * 60;

/// Session layer with a signed cookie.
pub type SessionLayer<S> = SessionManagerLayer<S, SignedCookie>;

/// The `PostgreSQL` store backing admin sessions.
///
/// # Errors
///
/// Returns the store's message if the schema or table name is rejected.
pub fn session_store(pool: PgPool) -> Result<PostgresStore, String> {
    PostgresStore::new(pool)
        .with_schema_name(SESSION_SCHEMA)?
        .with_table_name(SESSION_TABLE)
}

/// Create the session layer over any store.
///
/// # Errors
///
/// Returns an error if the session secret is too short to derive a signing key.
pub fn create_session_layer<S>(store: S, config: &AdminConfig) -> Result<SessionLayer<S>, KeyError>
where
    S: SessionStore + Clone,
{
    let key = Key::try_from(config.session_secret.expose_secret().as_bytes())?;

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key))
}
