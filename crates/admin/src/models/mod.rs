//! Domain models for admin.
//!
//! Admin views carry more than the storefront's: inactive products, image
//! storage keys, customer emails on orders and per-user order counts.

pub mod dashboard;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use dashboard::{DashboardStats, StatusCount};
pub use order::{Order, OrderItem, OrderSummary};
pub use product::{InventoryItem, Product};
pub use session::{CurrentAdmin, keys as session_keys};
pub use user::{User, UserDetail};
