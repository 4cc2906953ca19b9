//! Persistent carts.
//!
//! One `shop.cart_item` row per (user, product). Each row remembers the unit
//! price at the time it was added so price drift can be shown and checked at
//! checkout.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use marketstall_core::cart::{self, CartError, CartLine, CartSummary};
use marketstall_core::{Money, ProductId, Quantity, UserId};

use super::RepositoryError;

/// Errors from cart changes.
#[derive(Debug, Error)]
pub enum CartChangeError {
    /// The change breaks a cart rule.
    #[error(transparent)]
    Rejected(#[from] CartError),
    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CartChangeError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    product_id: i32,
    name: String,
    image_url: Option<String>,
    quantity: i32,
    price: Decimal,
    unit_price_snapshot: Decimal,
    stock: i32,
    is_active: bool,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            RepositoryError::DataCorruption(format!(
                "invalid {what} in cart line for product {}: {e}",
                row.product_id
            ))
        };
        let quantity = Quantity::try_from(row.quantity).map_err(|e| corrupt("quantity", &e))?;
        let unit_price = Money::try_from(row.price).map_err(|e| corrupt("price", &e))?;
        let unit_price_snapshot =
            Money::try_from(row.unit_price_snapshot).map_err(|e| corrupt("snapshot", &e))?;
        let line_total = unit_price
            .checked_mul(quantity.get())
            .map_err(|e| corrupt("line total", &e))?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            image_url: row.image_url,
            quantity,
            unit_price,
            unit_price_snapshot,
            line_total,
            available: row.stock,
            is_active: row.is_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StockRow {
    price: Decimal,
    stock: i32,
    is_active: bool,
}

/// Repository for cart operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All cart lines for a user, joined with current product data.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT c.product_id, p.name, p.image_url, c.quantity, p.price,
                   c.unit_price_snapshot, p.stock, p.is_active
            FROM shop.cart_item c
            JOIN shop.product p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.created_at, c.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    /// The user's cart with totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if loading fails or totals overflow.
    pub async fn summary(&self, user_id: UserId) -> Result<CartSummary, RepositoryError> {
        let lines = self.lines(user_id).await?;
        CartSummary::from_lines(lines)
            .map_err(|e| RepositoryError::DataCorruption(format!("cart total: {e}")))
    }

    /// Total units in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM shop.cart_item WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Add units of a product, incrementing an existing line.
    ///
    /// The line's price snapshot is reset to the current price.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the product is unavailable or stock is short.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Quantity, CartChangeError> {
        let mut tx = self.pool.begin().await?;
        let existing = lock_line(&mut tx, user_id, product_id).await?;
        let (price, stock) = lock_product(&mut tx, product_id).await?;

        let merged = cart::merge_quantity(existing, quantity, stock)?;

        sqlx::query(
            r"
            INSERT INTO shop.cart_item (user_id, product_id, quantity, unit_price_snapshot)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity,
                          unit_price_snapshot = EXCLUDED.unit_price_snapshot,
                          updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(merged.as_i32())
        .bind(price)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(merged)
    }

    /// Replace the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `Rejected(NotInCart)` if there is no such line, or another
    /// `Rejected` variant if stock is short.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), CartChangeError> {
        let mut tx = self.pool.begin().await?;
        if lock_line(&mut tx, user_id, product_id).await?.is_none() {
            return Err(CartError::NotInCart(product_id).into());
        }
        let (_, stock) = lock_product(&mut tx, product_id).await?;
        let quantity = cart::set_quantity(quantity, stock)?;

        sqlx::query(
            r"
            UPDATE shop.cart_item SET quantity = $3, updated_at = NOW()
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity.as_i32())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove a line. Returns whether a line was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Set every line's price snapshot to the current product price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn refresh_prices(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.cart_item c
            SET unit_price_snapshot = p.price, updated_at = NOW()
            FROM shop.product p
            WHERE p.id = c.product_id
              AND c.user_id = $1
              AND c.unit_price_snapshot <> p.price
            ",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Lock a cart line and read its quantity.
///
/// Cart writes take the line lock before the product lock, the same order
/// checkout takes them in.
async fn lock_line(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    product_id: ProductId,
) -> Result<Option<Quantity>, RepositoryError> {
    let quantity: Option<i32> = sqlx::query_scalar(
        "SELECT quantity FROM shop.cart_item WHERE user_id = $1 AND product_id = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;

    quantity
        .map(Quantity::try_from)
        .transpose()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid cart quantity: {e}")))
}

/// Lock an active product row and return its price and stock.
async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
) -> Result<(Money, i32), CartChangeError> {
    let row = sqlx::query_as::<_, StockRow>(
        "SELECT price, stock, is_active FROM shop.product WHERE id = $1 FOR SHARE",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;

    let row = row
        .filter(|r| r.is_active)
        .ok_or(CartError::ProductUnavailable(product_id))?;
    let price = Money::try_from(row.price).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid price for product {product_id}: {e}"))
    })?;
    Ok((price, row.stock))
}
