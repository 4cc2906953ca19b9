//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ADMIN_BASE_URL` - Public URL for the admin API
//! - `ADMIN_SESSION_SECRET` - Cookie signing secret (min 64 chars, high entropy)
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `LOW_STOCK_THRESHOLD` - Stock at or below which a product is "low" (default: 5)
//! - `LOG_FORMAT` - `json` for JSON log lines, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)
//!
//! ## Image storage
//! - `STORAGE_BACKEND` - `filesystem` (default) or `http`
//! - `STORAGE_PUBLIC_URL` - URL prefix under which stored keys are served
//!   (default: `/media` for filesystem)
//! - `STORAGE_DIR` - Root directory for the filesystem backend (default: `media`)
//! - `STORAGE_ENDPOINT` - Object API base URL (http backend, required)
//! - `STORAGE_BUCKET` - Bucket name (http backend, required)
//! - `STORAGE_TOKEN` - Bearer token (http backend, required)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;

use marketstall_core::env;
pub use marketstall_core::env::ConfigError;

/// Where product images are written.
///
/// Implements `Debug` manually to redact the object API token.
#[derive(Clone)]
pub enum StorageConfig {
    /// Local directory, typically the one the storefront serves at `/media`.
    Filesystem {
        /// Root directory for stored objects.
        dir: PathBuf,
        /// URL prefix for stored keys.
        public_url: String,
    },
    /// Remote object API (`PUT/DELETE {endpoint}/object/{bucket}/{key}`).
    Http {
        /// API base URL.
        endpoint: String,
        /// Bucket name.
        bucket: String,
        /// Bearer token.
        token: SecretString,
        /// URL prefix for stored keys.
        public_url: String,
    },
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filesystem { dir, public_url } => f
                .debug_struct("Filesystem")
                .field("dir", dir)
                .field("public_url", public_url)
                .finish(),
            Self::Http {
                endpoint,
                bucket,
                public_url,
                ..
            } => f
                .debug_struct("Http")
                .field("endpoint", endpoint)
                .field("bucket", bucket)
                .field("token", &"[REDACTED]")
                .field("public_url", public_url)
                .finish(),
        }
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        match env::or_default("STORAGE_BACKEND", "filesystem").as_str() {
            "filesystem" => Ok(Self::Filesystem {
                dir: PathBuf::from(env::or_default("STORAGE_DIR", "media")),
                public_url: env::or_default("STORAGE_PUBLIC_URL", "/media"),
            }),
            "http" => Ok(Self::Http {
                endpoint: env::required("STORAGE_ENDPOINT")?,
                bucket: env::required("STORAGE_BUCKET")?,
                token: SecretString::from(env::required("STORAGE_TOKEN")?),
                public_url: env::required("STORAGE_PUBLIC_URL")?,
            }),
            other => Err(ConfigError::InvalidEnvVar(
                "STORAGE_BACKEND".to_owned(),
                format!("expected 'filesystem' or 'http', got '{other}'"),
            )),
        }
    }
}

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL; an `https` scheme marks cookies `Secure`
    pub base_url: String,
    pub session_secret: SecretString,
    /// Products with stock at or below this are reported as low
    pub low_stock_threshold: i32,
    pub storage: StorageConfig,
    pub json_logs: bool,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

impl AdminConfig {
    /// Load configuration from the environment, reading `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing, a value does
    /// not parse, the session secret is weak, or the storage backend is
    /// incompletely configured.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let low_stock_threshold = env::parse_or_default("LOW_STOCK_THRESHOLD", 5_i32)?;
        if low_stock_threshold < 0 {
            return Err(ConfigError::InvalidEnvVar(
                "LOW_STOCK_THRESHOLD".to_owned(),
                "must not be negative".to_owned(),
            ));
        }

        Ok(Self {
            database_url: env::database_url("ADMIN_DATABASE_URL")?,
            host: env::parse_or_default("ADMIN_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env::parse_or_default("ADMIN_PORT", 3001_u16)?,
            base_url: env::required("ADMIN_BASE_URL")?,
            session_secret: env::signing_secret("ADMIN_SESSION_SECRET")?,
            low_stock_threshold,
            storage: StorageConfig::from_env()?,
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
mod tests {
    use super::*;

    fn config(storage: StorageConfig) -> AdminConfig {
        AdminConfig {
            database_url: SecretString::from("postgres://admin:hunter2@db/shop"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3001,
            base_url: "http://localhost:3001".to_owned(),
            session_secret: SecretString::from("admin_session_value".repeat(4)),
            low_stock_threshold: 5,
            storage,
            json_logs: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_socket_addr_and_scheme() {
        let config = config(StorageConfig::Filesystem {
            dir: PathBuf::from("media"),
            public_url: "/media".to_owned(),
        });
        assert_eq!(config.socket_addr().port(), 3001);
        assert!(!config.is_https());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = config(StorageConfig::Http {
            endpoint: "https://objects.internal".to_owned(),
            bucket: "product-images".to_owned(),
            token: SecretString::from("tok_live_abc123"),
            public_url: "https://cdn.shop.test".to_owned(),
        });

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("product-images"));
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("admin_session_value"));
        assert!(!debug_output.contains("tok_live_abc123"));
    }
}
