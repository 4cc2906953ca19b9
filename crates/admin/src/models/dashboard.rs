//! Dashboard figures.

use serde::Serialize;

use marketstall_core::{Money, OrderStatus};

/// Number of orders in one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Shop-wide counters for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub product_count: i64,
    pub active_product_count: i64,
    pub low_stock_count: i64,
    pub low_stock_threshold: i32,
    /// Every status, in lifecycle order, including zero counts.
    pub orders_by_status: Vec<StatusCount>,
    /// Sum of totals of orders that were not cancelled.
    pub revenue: Money,
}

impl DashboardStats {
    /// Orders across all statuses.
    #[must_use]
    pub fn order_count(&self) -> i64 {
        self.orders_by_status.iter().map(|s| s.count).sum()
    }
}
