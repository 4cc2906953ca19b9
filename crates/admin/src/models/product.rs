//! Products as managed by staff.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marketstall_core::{Money, ProductId};

/// A catalog product, active or archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: i32,
    pub image_url: Option<String>,
    /// Storage key of the current image.
    #[serde(skip)]
    pub image_key: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inventory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryItem {
    pub product_id: ProductId,
    pub name: String,
    pub stock: i32,
    pub is_active: bool,
    /// Stock is at or below the configured threshold.
    pub low_stock: bool,
    pub updated_at: DateTime<Utc>,
}
