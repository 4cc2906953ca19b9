//! Order review and fulfilment.
//!
//! Status changes follow [`OrderStatus::can_transition_to`]. Cancelling
//! returns every unit to stock inside the same transaction as the status
//! change.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use thiserror::Error;
use tracing::instrument;

use marketstall_core::validation::ShippingDetails;
use marketstall_core::{
    Email, Money, OrderId, OrderItemId, OrderStatus, Page, Paginated, ProductId, Quantity, UserId,
};

use super::RepositoryError;
use crate::models::{Order, OrderItem, OrderSummary};

/// Errors from changing an order's status.
#[derive(Debug, Error)]
pub enum StatusChangeError {
    /// The lifecycle does not allow this move.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },
    /// Storage failure or unknown order.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for StatusChangeError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Order list filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
}

impl OrderFilter {
    fn push_where(self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(status) = self.status {
            qb.push(" AND o.status = ").push_bind(status);
        }
        if let Some(user_id) = self.user_id {
            qb.push(" AND o.user_id = ").push_bind(user_id);
        }
    }
}

fn corrupt(what: &str, id: i32, e: &dyn std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid {what} {id}: {e}"))
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    email: String,
    status: OrderStatus,
    total: Decimal,
    shipping_name: String,
    shipping_address: String,
    shipping_phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: i32,
    user_id: i32,
    email: String,
    status: OrderStatus,
    total: Decimal,
    item_count: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<SummaryRow> for OrderSummary {
    type Error = RepositoryError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            customer_email: Email::parse(&row.email).map_err(|e| corrupt("order", row.id, &e))?,
            status: row.status,
            total: Money::try_from(row.total).map_err(|e| corrupt("order", row.id, &e))?,
            item_count: row.item_count,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    product_id: i32,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity =
            Quantity::try_from(row.quantity).map_err(|e| corrupt("order item", row.id, &e))?;
        let unit_price =
            Money::try_from(row.unit_price).map_err(|e| corrupt("order item", row.id, &e))?;
        let line_total = unit_price
            .checked_mul(quantity.get())
            .map_err(|e| corrupt("order item", row.id, &e))?;

        Ok(Self {
            id: OrderItemId::new(row.id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            quantity,
            unit_price,
            line_total,
        })
    }
}

const SELECT_ORDER: &str = r#"
    SELECT o.id, o.user_id, u.email, o.status, o.total,
           o.shipping_name, o.shipping_address, o.shipping_phone,
           o.created_at, o.updated_at
    FROM shop."order" o
    JOIN shop."user" u ON u.id = o.user_id
"#;

/// Repository for order administration.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: OrderFilter,
        page: Page,
    ) -> Result<Paginated<OrderSummary>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(r#"SELECT COUNT(*) FROM shop."order" o"#);
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT o.id, o.user_id, u.email, o.status, o.total, o.created_at,
                   COALESCE((SELECT SUM(quantity) FROM shop.order_item WHERE order_id = o.id), 0)::BIGINT
                       AS item_count
            FROM shop."order" o
            JOIN shop."user" u ON u.id = o.user_id
            "#,
        );
        filter.push_where(&mut qb);
        qb.push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let orders = qb
            .build_query_as::<SummaryRow>()
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(OrderSummary::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Paginated::new(orders, page, total))
    }

    /// An order with its items and customer email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, product_id, product_name, quantity, unit_price
            FROM shop.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(OrderItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        into_order(row, items).map(Some)
    }

    /// Move an order to `next`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the lifecycle forbids the move, or
    /// `Repository(NotFound)` for an unknown order.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, StatusChangeError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<OrderStatus> =
            sqlx::query_scalar(r#"SELECT status FROM shop."order" WHERE id = $1 FOR UPDATE"#)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or(RepositoryError::NotFound)?;

        if !current.can_transition_to(next) {
            return Err(StatusChangeError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        sqlx::query(r#"UPDATE shop."order" SET status = $2, updated_at = NOW() WHERE id = $1"#)
            .bind(id)
            .bind(next)
            .execute(&mut *tx)
            .await?;

        if next.releases_stock() {
            restock(&mut tx, id).await?;
        }

        tx.commit().await?;
        tracing::info!(from = %current, to = %next, "order status changed");

        self.get(id)
            .await?
            .ok_or(StatusChangeError::Repository(RepositoryError::NotFound))
    }
}

fn into_order(row: OrderRow, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
    Ok(Order {
        id: OrderId::new(row.id),
        user_id: UserId::new(row.user_id),
        customer_email: Email::parse(&row.email).map_err(|e| corrupt("order", row.id, &e))?,
        status: row.status,
        total: Money::try_from(row.total).map_err(|e| corrupt("order", row.id, &e))?,
        shipping: ShippingDetails {
            name: row.shipping_name,
            address: row.shipping_address,
            phone: row.shipping_phone,
        },
        items,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Return every unit of an order to stock.
///
/// Locks the product rows in id order before updating them, matching
/// checkout. Stock saturates at the `INT` maximum.
async fn restock(tx: &mut Transaction<'_, Postgres>, order_id: OrderId) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        SELECT p.id
        FROM shop.product p
        WHERE p.id IN (SELECT product_id FROM shop.order_item WHERE order_id = $1)
        ORDER BY p.id
        FOR UPDATE
        ",
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;

    let result = sqlx::query(
        r"
        UPDATE shop.product p
        SET stock = LEAST(p.stock::BIGINT + oi.quantity, 2147483647)::INT,
            updated_at = NOW()
        FROM (
            SELECT product_id, SUM(quantity) AS quantity
            FROM shop.order_item
            WHERE order_id = $1
            GROUP BY product_id
        ) oi
        WHERE p.id = oi.product_id
        ",
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;

    tracing::debug!(products = result.rows_affected(), "order restocked");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_sql() {
        let filter = OrderFilter {
            status: Some(OrderStatus::Paid),
            user_id: Some(UserId::new(7)),
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM o");
        filter.push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT 1 FROM o WHERE TRUE AND o.status = $1 AND o.user_id = $2"
        );
    }
}
