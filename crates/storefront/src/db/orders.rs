//! Order placement and history.
//!
//! Placing an order is a single transaction: product rows are locked in id
//! order, the plan is computed under the locks, and the order, its items,
//! the stock decrements and the cart cleanup all commit or roll back together.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use thiserror::Error;
use tracing::instrument;

use marketstall_core::checkout::{
    self, CheckoutError, OrderPlan, ProductSnapshot, RequestedLine,
};
use marketstall_core::validation::ShippingDetails;
use marketstall_core::{
    Money, OrderId, OrderItemId, OrderStatus, Page, Paginated, ProductId, Quantity, UserId,
};

use super::RepositoryError;
use crate::models::{Order, OrderItem, OrderSummary};

/// What is being bought.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutSource {
    /// Every line in the user's cart.
    Cart,
    /// A single product, bypassing the cart.
    Direct {
        product_id: ProductId,
        quantity: Quantity,
        expected_unit_price: Option<Money>,
    },
}

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// The order breaks a checkout rule; nothing was written.
    #[error(transparent)]
    Rejected(#[from] CheckoutError),
    /// Storage failure; nothing was written.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PlaceOrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Errors from a customer cancelling an order.
#[derive(Debug, Error)]
pub enum CancelOrderError {
    /// The order has moved past the point where the customer may cancel.
    #[error("order can no longer be cancelled (status: {0})")]
    NotCancellable(OrderStatus),
    /// Storage failure, or the order does not exist for this user.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CancelOrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    status: OrderStatus,
    total: Decimal,
    shipping_name: String,
    shipping_address: String,
    shipping_phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
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
        let corrupt = |e: &dyn std::fmt::Display| {
            RepositoryError::DataCorruption(format!("invalid order item {}: {e}", row.id))
        };
        let quantity = Quantity::try_from(row.quantity).map_err(|e| corrupt(&e))?;
        let unit_price = Money::try_from(row.unit_price).map_err(|e| corrupt(&e))?;
        let line_total = unit_price.checked_mul(quantity.get()).map_err(|e| corrupt(&e))?;

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

fn into_order(row: OrderRow, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
    let total = Money::try_from(row.total).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid total for order {}: {e}", row.id))
    })?;

    Ok(Order {
        id: OrderId::new(row.id),
        status: row.status,
        total,
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

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: i32,
    name: String,
    price: Decimal,
    stock: i32,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct CartSourceRow {
    product_id: i32,
    quantity: i32,
    unit_price_snapshot: Decimal,
}

/// Repository for order operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns `PlaceOrderError::Rejected` when the checkout rules refuse the
    /// order, or `PlaceOrderError::Repository` on storage failure. In both
    /// cases the transaction is rolled back.
    #[instrument(skip(self, shipping))]
    pub async fn place(
        &self,
        user_id: UserId,
        source: &CheckoutSource,
        shipping: &ShippingDetails,
        expected_total: Option<Money>,
    ) -> Result<Order, PlaceOrderError> {
        let mut tx = self.pool.begin().await?;

        let lines = load_source(&mut tx, user_id, source).await?;
        let ids = checkout::product_ids(&lines);
        let snapshots = lock_products(&mut tx, &ids).await?;
        let plan = checkout::plan_order(&lines, &snapshots, expected_total)?;

        let order = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO shop."order"
                (user_id, status, total, shipping_name, shipping_address, shipping_phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, status, total, shipping_name, shipping_address, shipping_phone,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(OrderStatus::Pending)
        .bind(plan.total)
        .bind(&shipping.name)
        .bind(&shipping.address)
        .bind(shipping.phone.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        let items = insert_items(&mut tx, OrderId::new(order.id), &plan).await?;
        decrement_stock(&mut tx, &plan).await?;

        if *source == CheckoutSource::Cart {
            let purchased: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
            sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1 AND product_id = ANY($2)")
                .bind(user_id)
                .bind(&purchased)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let order = into_order(order, items)?;
        tracing::info!(
            order_id = %order.id,
            total = %order.total,
            lines = order.items.len(),
            "order placed"
        );
        Ok(order)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Paginated<OrderSummary>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct SummaryRow {
            id: i32,
            status: OrderStatus,
            total: Decimal,
            item_count: i64,
            created_at: DateTime<Utc>,
        }

        let total: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM shop."order" WHERE user_id = $1"#)
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;

        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT o.id, o.status, o.total, o.created_at,
                   COALESCE((SELECT SUM(quantity) FROM shop.order_item WHERE order_id = o.id), 0)::BIGINT
                       AS item_count
            FROM shop."order" o
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|r| {
                let total = Money::try_from(r.total).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid total for order {}: {e}", r.id))
                })?;
                Ok(OrderSummary {
                    id: OrderId::new(r.id),
                    status: r.status,
                    total,
                    item_count: r.item_count,
                    created_at: r.created_at,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Paginated::new(items, page, total))
    }

    /// An order with its items, only if it belongs to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, status, total, shipping_name, shipping_address, shipping_phone,
                   created_at, updated_at
            FROM shop."order"
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(order_id)
        .bind(user_id)
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
        .bind(order_id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(OrderItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        into_order(row, items).map(Some)
    }

    /// Cancel a pending order and return its units to stock.
    ///
    /// # Errors
    ///
    /// Returns `Repository(NotFound)` if the order does not belong to the
    /// user, or `NotCancellable` once it has left `pending`.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: UserId, order_id: OrderId) -> Result<Order, CancelOrderError> {
        let mut tx = self.pool.begin().await?;

        let status: Option<OrderStatus> = sqlx::query_scalar(
            r#"SELECT status FROM shop."order" WHERE id = $1 AND user_id = $2 FOR UPDATE"#,
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let status = status.ok_or(RepositoryError::NotFound)?;
        if !status.is_customer_cancellable() {
            return Err(CancelOrderError::NotCancellable(status));
        }

        sqlx::query(r#"UPDATE shop."order" SET status = $2, updated_at = NOW() WHERE id = $1"#)
            .bind(order_id)
            .bind(OrderStatus::Cancelled)
            .execute(&mut *tx)
            .await?;

        restock(&mut tx, order_id).await?;
        tx.commit().await?;

        tracing::info!("order cancelled by customer");

        self.get_for_user(user_id, order_id)
            .await?
            .ok_or(CancelOrderError::Repository(RepositoryError::NotFound))
    }
}

/// Requested lines for a checkout source.
async fn load_source(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    source: &CheckoutSource,
) -> Result<Vec<RequestedLine>, PlaceOrderError> {
    match source {
        CheckoutSource::Direct {
            product_id,
            quantity,
            expected_unit_price,
        } => Ok(vec![RequestedLine {
            product_id: *product_id,
            quantity: *quantity,
            expected_unit_price: *expected_unit_price,
        }]),
        CheckoutSource::Cart => {
            let rows = sqlx::query_as::<_, CartSourceRow>(
                r"
                SELECT product_id, quantity, unit_price_snapshot
                FROM shop.cart_item
                WHERE user_id = $1
                ORDER BY product_id
                FOR UPDATE
                ",
            )
            .bind(user_id)
            .fetch_all(&mut **tx)
            .await?;

            rows.into_iter()
                .map(|r| {
                    let corrupt = |e: &dyn std::fmt::Display| {
                        RepositoryError::DataCorruption(format!(
                            "invalid cart line for product {}: {e}",
                            r.product_id
                        ))
                    };
                    Ok(RequestedLine {
                        product_id: ProductId::new(r.product_id),
                        quantity: Quantity::try_from(r.quantity).map_err(|e| corrupt(&e))?,
                        expected_unit_price: Some(
                            Money::try_from(r.unit_price_snapshot).map_err(|e| corrupt(&e))?,
                        ),
                    })
                })
                .collect::<Result<Vec<_>, RepositoryError>>()
                .map_err(Into::into)
        }
    }
}

/// Lock product rows in id order and read their current state.
async fn lock_products(
    tx: &mut Transaction<'_, Postgres>,
    ids: &[ProductId],
) -> Result<Vec<ProductSnapshot>, PlaceOrderError> {
    let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
    let rows = sqlx::query_as::<_, SnapshotRow>(
        r"
        SELECT id, name, price, stock, is_active
        FROM shop.product
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(&ids)
    .fetch_all(&mut **tx)
    .await?;

    rows.into_iter()
        .map(|r| {
            let price = Money::try_from(r.price).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid price for product {}: {e}", r.id))
            })?;
            Ok(ProductSnapshot {
                id: ProductId::new(r.id),
                name: r.name,
                price,
                stock: r.stock,
                is_active: r.is_active,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()
        .map_err(Into::into)
}

/// Insert every planned line in one statement.
async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
    plan: &OrderPlan,
) -> Result<Vec<OrderItem>, PlaceOrderError> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "INSERT INTO shop.order_item (order_id, product_id, product_name, quantity, unit_price) ",
    );
    qb.push_values(&plan.lines, |mut b, line| {
        b.push_bind(order_id)
            .push_bind(line.product_id)
            .push_bind(&line.product_name)
            .push_bind(line.quantity.as_i32())
            .push_bind(line.unit_price);
    });
    qb.push(" RETURNING id, product_id");

    let ids: Vec<(i32, i32)> = qb.build_query_as().fetch_all(&mut **tx).await?;
    let by_product: HashMap<i32, i32> = ids.into_iter().map(|(id, p)| (p, id)).collect();

    plan.lines
        .iter()
        .map(|line| {
            let id = by_product.get(&line.product_id.as_i32()).copied().ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "order item for product {} was not returned",
                    line.product_id
                ))
            })?;
            Ok(OrderItem {
                id: OrderItemId::new(id),
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()
        .map_err(Into::into)
}

/// Take the planned units out of stock.
///
/// The rows are already locked, so the guard only fails if the plan and the
/// table disagree; the whole order is then refused.
async fn decrement_stock(
    tx: &mut Transaction<'_, Postgres>,
    plan: &OrderPlan,
) -> Result<(), PlaceOrderError> {
    for line in &plan.lines {
        let result = sqlx::query(
            r"
            UPDATE shop.product
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            ",
        )
        .bind(line.product_id)
        .bind(line.quantity.as_i32())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            let available: i32 =
                sqlx::query_scalar("SELECT stock FROM shop.product WHERE id = $1")
                    .bind(line.product_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .unwrap_or(0);
            return Err(CheckoutError::InsufficientStock {
                product_id: line.product_id,
                name: line.product_name.clone(),
                requested: line.quantity.get(),
                available,
            }
            .into());
        }
    }
    Ok(())
}

/// Return every unit of an order to stock.
///
/// Product rows are locked in id order first, the same order checkout uses.
/// The sum saturates at the `INT` maximum.
async fn restock(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
) -> Result<(), sqlx::Error> {
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

    sqlx::query(
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
    Ok(())
}
