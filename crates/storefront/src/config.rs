//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Cookie signing secret (min 64 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_MEDIA_DIR` - Directory served at `/media` (default: `media`)
//! - `CATALOG_CACHE_TTL_SECS` - Product detail cache lifetime (default: 30)
//! - `LOG_FORMAT` - `json` for JSON log lines, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use marketstall_core::env;
pub use marketstall_core::env::ConfigError;

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL; an `https` scheme marks cookies `Secure`
    pub base_url: String,
    pub session_secret: SecretString,
    /// Directory with uploaded product images
    pub media_dir: PathBuf,
    /// How long product detail stays cached
    pub catalog_cache_ttl: Duration,
    pub json_logs: bool,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

impl StorefrontConfig {
    /// Load configuration from the environment, reading `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing, a value does
    /// not parse, or the session secret is weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: env::database_url("STOREFRONT_DATABASE_URL")?,
            host: env::parse_or_default("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env::parse_or_default("STOREFRONT_PORT", 3000_u16)?,
            base_url: env::required("STOREFRONT_BASE_URL")?,
            session_secret: env::signing_secret("STOREFRONT_SESSION_SECRET")?,
            media_dir: PathBuf::from(env::or_default("STOREFRONT_MEDIA_DIR", "media")),
            catalog_cache_ttl: Duration::from_secs(env::parse_or_default(
                "CATALOG_CACHE_TTL_SECS",
                30_u64,
            )?),
            json_logs: env::json_logs(),
            sentry_dsn: env::optional("SENTRY_DSN"),
            sentry_environment: env::optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env::parse_or_default("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: env::parse_or_default("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies must be marked `Secure`.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://shop:hunter2@db/shop"),
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            base_url: base_url.to_owned(),
            session_secret: SecretString::from("storefront_cookie_key".repeat(4)),
            media_dir: PathBuf::from("media"),
            catalog_cache_ttl: Duration::from_secs(30),
            json_logs: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_socket_addr_and_scheme() {
        let secure = config("https://shop.test");
        assert_eq!(secure.socket_addr().to_string(), "0.0.0.0:8080");
        assert!(secure.is_https());
        assert!(!config("http://localhost:8080").is_https());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", config("http://localhost:8080"));
        assert!(debug_output.contains("localhost:8080"));
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("storefront_cookie_key"));
    }
}
