//! Stock levels.
//!
//! Adjustments are applied with a single guarded `UPDATE`, so concurrent
//! checkouts and adjustments never drive stock below zero.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use tracing::instrument;

use marketstall_core::{Page, Paginated, ProductId};

use super::RepositoryError;
use crate::models::InventoryItem;

/// Why a stock change was refused.
#[derive(Debug, Error)]
pub enum StockChangeError {
    /// The change would leave a negative stock level.
    #[error("stock cannot go below zero (current {current}, change {delta})")]
    WouldGoNegative {
        /// Stock before the change.
        current: i32,
        /// Requested relative change.
        delta: i32,
    },
    /// The change would push stock past the largest storable level.
    #[error("stock cannot exceed {max} (current {current}, change {delta})", max = i32::MAX)]
    TooLarge {
        /// Stock before the change.
        current: i32,
        /// Requested relative change.
        delta: i32,
    },
    /// An absolute stock level below zero was requested.
    #[error("stock cannot be negative")]
    Negative,
    /// Storage failure or unknown product.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for StockChangeError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    id: i32,
    name: String,
    stock: i32,
    is_active: bool,
    updated_at: DateTime<Utc>,
}

/// Inventory list filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryFilter {
    /// Only products at or below the low-stock threshold.
    pub low_stock: bool,
}

impl InventoryFilter {
    fn push_where(self, qb: &mut QueryBuilder<'_, Postgres>, threshold: i32) {
        if self.low_stock {
            qb.push(" WHERE stock <= ").push_bind(threshold);
        }
    }
}

/// Repository for stock levels.
pub struct InventoryRepository<'a> {
    pool: &'a PgPool,
    low_stock_threshold: i32,
}

impl<'a> InventoryRepository<'a> {
    /// Create a new inventory repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool, low_stock_threshold: i32) -> Self {
        Self {
            pool,
            low_stock_threshold,
        }
    }

    fn item(&self, row: InventoryRow) -> InventoryItem {
        InventoryItem {
            product_id: ProductId::new(row.id),
            name: row.name,
            stock: row.stock,
            is_active: row.is_active,
            low_stock: row.stock <= self.low_stock_threshold,
            updated_at: row.updated_at,
        }
    }

    /// Products ordered by stock, lowest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: InventoryFilter,
        page: Page,
    ) -> Result<Paginated<InventoryItem>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM shop.product");
        filter.push_where(&mut count, self.low_stock_threshold);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, name, stock, is_active, updated_at FROM shop.product",
        );
        filter.push_where(&mut qb, self.low_stock_threshold);
        qb.push(" ORDER BY stock ASC, id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = qb
            .build_query_as::<InventoryRow>()
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(|row| self.item(row))
            .collect();

        Ok(Paginated::new(items, page, total))
    }

    /// Change stock by `delta` units.
    ///
    /// # Errors
    ///
    /// Returns `WouldGoNegative` or `TooLarge` if the result would leave the
    /// `0..=i32::MAX` range, or `Repository(NotFound)` for an unknown product.
    #[instrument(skip(self))]
    pub async fn adjust(
        &self,
        id: ProductId,
        delta: i32,
    ) -> Result<InventoryItem, StockChangeError> {
        let row = sqlx::query_as::<_, InventoryRow>(
            r"
            UPDATE shop.product
            SET stock = (stock::BIGINT + $2)::INT, updated_at = NOW()
            WHERE id = $1 AND stock::BIGINT + $2 BETWEEN 0 AND 2147483647
            RETURNING id, name, stock, is_active, updated_at
            ",
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await?;

        if let Some(row) = row {
            tracing::info!(stock = row.stock, "stock adjusted");
            return Ok(self.item(row));
        }

        let current: Option<i32> =
            sqlx::query_scalar("SELECT stock FROM shop.product WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        match current {
            Some(current) => Err(refusal(current, delta)),
            None => Err(RepositoryError::NotFound.into()),
        }
    }

    /// Set stock to an absolute value.
    ///
    /// # Errors
    ///
    /// Returns `Negative` for values below zero, or `Repository(NotFound)`
    /// for an unknown product.
    #[instrument(skip(self))]
    pub async fn set(&self, id: ProductId, stock: i32) -> Result<InventoryItem, StockChangeError> {
        if stock < 0 {
            return Err(StockChangeError::Negative);
        }

        let row = sqlx::query_as::<_, InventoryRow>(
            r"
            UPDATE shop.product
            SET stock = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, stock, is_active, updated_at
            ",
        )
        .bind(id)
        .bind(stock)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tracing::info!("stock set");
        Ok(self.item(row))
    }
}

/// Why `delta` cannot be applied to `current`.
const fn refusal(current: i32, delta: i32) -> StockChangeError {
    if current.checked_add(delta).is_none() && delta > 0 {
        StockChangeError::TooLarge { current, delta }
    } else {
        StockChangeError::WouldGoNegative { current, delta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refusal_reason() {
        assert!(matches!(
            refusal(10, i32::MAX),
            StockChangeError::TooLarge {
                current: 10,
                delta: i32::MAX
            }
        ));
        assert!(matches!(
            refusal(2, -5),
            StockChangeError::WouldGoNegative {
                current: 2,
                delta: -5
            }
        ));
    }

    #[test]
    fn test_filter_sql() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM shop.product");
        InventoryFilter { low_stock: true }.push_where(&mut qb, 5);
        assert_eq!(qb.sql(), "SELECT 1 FROM shop.product WHERE stock <= $1");
    }
}
