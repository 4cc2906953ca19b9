//! Domain models for the storefront.
//!
//! These types are what handlers work with and what the API serializes;
//! database row types stay private to the `db` module.

pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use order::{Order, OrderItem, OrderSummary};
pub use product::Product;
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
