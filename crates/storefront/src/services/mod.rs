//! Business logic services for the storefront.
//!
//! - `auth` - Registration and password login
//! - `catalog` - Cached product lookups

pub mod auth;
pub mod catalog;

pub use auth::{AuthError, AuthService};
pub use catalog::CatalogCache;
