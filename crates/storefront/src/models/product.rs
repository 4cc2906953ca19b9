//! Catalog product as seen by shoppers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marketstall_core::{Money, ProductId};

/// A product listed in the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// At least one unit can be bought.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
