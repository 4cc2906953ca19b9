//! Business logic services for admin.

pub mod auth;
pub mod storage;

pub use auth::{AuthError, AuthService};
pub use storage::{ImageStorage, StorageError};
