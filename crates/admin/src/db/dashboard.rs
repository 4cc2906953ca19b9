//! Aggregate counters for the dashboard.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;

use marketstall_core::{Money, OrderStatus};

use super::RepositoryError;
use crate::models::{DashboardStats, StatusCount};

/// Repository for dashboard queries.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    /// Create a new dashboard repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Compute the dashboard counters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn stats(&self, low_stock_threshold: i32) -> Result<DashboardStats, RepositoryError> {
        let (product_count, active_product_count, low_stock_count): (i64, i64, i64) =
            sqlx::query_as(
                r"
                SELECT COUNT(*),
                       COUNT(*) FILTER (WHERE is_active),
                       COUNT(*) FILTER (WHERE stock <= $1)
                FROM shop.product
                ",
            )
            .bind(low_stock_threshold)
            .fetch_one(self.pool)
            .await?;

        let counts: HashMap<OrderStatus, i64> = sqlx::query_as::<_, (OrderStatus, i64)>(
            r#"SELECT status, COUNT(*) FROM shop."order" GROUP BY status"#,
        )
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .collect();

        let revenue: Decimal = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(total), 0) FROM shop."order" WHERE status <> 'cancelled'"#,
        )
        .fetch_one(self.pool)
        .await?;

        let revenue = Money::try_from(revenue)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid revenue total: {e}")))?;

        Ok(DashboardStats {
            product_count,
            active_product_count,
            low_stock_count,
            low_stock_threshold,
            orders_by_status: with_all_statuses(&counts),
            revenue,
        })
    }
}

/// One entry per status in lifecycle order, filling gaps with zero.
fn with_all_statuses(counts: &HashMap<OrderStatus, i64>) -> Vec<StatusCount> {
    OrderStatus::ALL
        .iter()
        .map(|&status| StatusCount {
            status,
            count: counts.get(&status).copied().unwrap_or(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_statuses_are_zero() {
        let counts = HashMap::from([(OrderStatus::Paid, 3), (OrderStatus::Cancelled, 1)]);
        let all = with_all_statuses(&counts);

        assert_eq!(all.len(), 5);
        assert_eq!(all[0], StatusCount { status: OrderStatus::Pending, count: 0 });
        assert_eq!(all[1], StatusCount { status: OrderStatus::Paid, count: 3 });
        assert_eq!(all[4].count, 1);
    }
}
