//! Orders as seen by staff.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marketstall_core::validation::ShippingDetails;
use marketstall_core::{Email, Money, OrderId, OrderItemId, OrderStatus, ProductId, Quantity, UserId};

/// An order with its items and the customer who placed it.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer_email: Email,
    pub status: OrderStatus,
    pub total: Money,
    pub shipping: ShippingDetails,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product line of an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Order list entry.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer_email: Email,
    pub status: OrderStatus,
    pub total: Money,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}
