//! Environment variable helpers shared by the binaries' config loaders.
//!
//! Signing secrets get extra scrutiny: a value is rejected if it looks like
//! a template placeholder, has low Shannon entropy, or is shorter than the
//! 64 bytes a cookie signing key needs.

use std::collections::HashMap;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

/// Minimum secret length; `cookie::Key` derivation needs 64 bytes.
pub const MIN_SECRET_LENGTH: usize = 64;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Substrings that mark a secret as copied from a template (case-insensitive).
const PLACEHOLDER_MARKERS: &[&str] = &[
    "changeme",
    "placeholder",
    "replace",
    "example",
    "secret",
    "password",
    "your-",
    "put-your",
    "insert",
    "xxx",
    "todo",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// A variable that must be set.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnvVar`] when `key` is unset or not unicode.
pub fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

#[must_use]
pub fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[must_use]
pub fn or_default(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_owned())
}

/// Parse `key` when set, otherwise use `default`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] when the value does not parse.
pub fn parse_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional(key).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
    })
}

/// The app-specific database URL, or the shared `DATABASE_URL`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnvVar`] naming `key` when neither is set.
pub fn database_url(key: &str) -> Result<SecretString, ConfigError> {
    optional(key)
        .or_else(|| optional("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_owned()))
}

/// A cookie signing secret that passed [`check_secret`].
///
/// # Errors
///
/// Returns an error when the variable is missing or the value is weak.
pub fn signing_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = required(key)?;
    check_secret(&value, key)?;
    Ok(SecretString::from(value))
}

/// Whether `LOG_FORMAT=json` is set.
#[must_use]
pub fn json_logs() -> bool {
    optional("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"))
}

/// Reject short, templated or low-entropy secrets.
///
/// # Errors
///
/// Returns [`ConfigError::InsecureSecret`] naming `key` and the failed check.
pub fn check_secret(value: &str, key: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| ConfigError::InsecureSecret(key.to_owned(), reason);

    if value.len() < MIN_SECRET_LENGTH {
        return Err(insecure(format!(
            "must be at least {MIN_SECRET_LENGTH} characters (got {})",
            value.len()
        )));
    }

    let lower = value.to_lowercase();
    if let Some(marker) = PLACEHOLDER_MARKERS.iter().find(|m| lower.contains(*m)) {
        return Err(insecure(format!(
            "appears to be a placeholder (contains '{marker}')"
        )));
    }

    let entropy = shannon_entropy(value);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(insecure(format!(
            "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
        )));
    }

    Ok(())
}

/// Bits per character.
fn shannon_entropy(s: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut total = 0_usize;
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let total = total as f64;
    counts
        .values()
        .map(|&n| {
            #[allow(clippy::cast_precision_loss)]
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STRONG: &str =
        "q8Zr!2mVx#T4wL9@kP7s$N3yB6&hD1jF5%cG0^uX8*eR2(aM4)oK7_iW3+zQ9=vJ6tY";

    #[test]
    fn test_entropy() {
        assert!(shannon_entropy("").abs() < f64::EPSILON);
        assert!(shannon_entropy("aaaa").abs() < f64::EPSILON);
        assert!((shannon_entropy("abab") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_strong_secret_accepted() {
        assert!(check_secret(STRONG, "K").is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = check_secret(&STRONG[..63], "K").unwrap_err();
        assert!(err.to_string().contains("at least 64"));
    }

    #[test]
    fn test_placeholder_rejected() {
        let value = format!("changeme-{STRONG}");
        let err = check_secret(&value, "SESSION").unwrap_err();
        assert!(err.to_string().contains("placeholder"));
        assert!(err.to_string().contains("SESSION"));
    }

    #[test]
    fn test_low_entropy_rejected() {
        let err = check_secret(&"ab".repeat(40), "K").unwrap_err();
        assert!(err.to_string().contains("entropy"));
    }
}
