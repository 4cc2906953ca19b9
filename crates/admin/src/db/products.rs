//! Product management.
//!
//! Unlike the storefront, admin sees archived (inactive) products too.
//! Products referenced by an order cannot be deleted; archive them instead.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use marketstall_core::validation::{ValidProduct, ValidProductPatch};
use marketstall_core::{search, Money, Page, Paginated, ProductId};

use super::RepositoryError;
use crate::models::Product;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i32,
    image_url: Option<String>,
    image_key: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = Money::try_from(row.price).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price for product {}: {e}", row.id))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price,
            stock: row.stock,
            image_url: row.image_url,
            image_key: row.image_key,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, image_url, image_key, \
                               is_active, created_at, updated_at";

/// Product list filters.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of the name.
    pub q: Option<String>,
    /// Only active (`true`) or only archived (`false`) products.
    pub active: Option<bool>,
}

impl ProductFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(q) = &self.q {
            qb.push(" AND name ILIKE ")
                .push_bind(search::contains_pattern(q));
        }
        if let Some(active) = self.active {
            qb.push(" AND is_active = ").push_bind(active);
        }
    }
}

/// Repository for product management.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<Paginated<Product>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM shop.product");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product"
        ));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let products = qb
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Paginated::new(products, page, total))
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    /// Insert a validated product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create(&self, product: &ValidProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop.product (name, description, price, stock, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price)
        .bind(product.stock)
        .bind(product.is_active)
        .fetch_one(self.pool)
        .await?;

        let product = Product::try_from(row)?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Apply a partial update. An empty patch returns the product unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        id: ProductId,
        patch: &ValidProductPatch,
    ) -> Result<Product, RepositoryError> {
        if patch.is_empty() {
            return self.get(id).await?.ok_or(RepositoryError::NotFound);
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE shop.product SET ");
        let mut set = qb.separated(", ");
        if let Some(name) = &patch.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(description) = &patch.description {
            set.push("description = ")
                .push_bind_unseparated(description.as_deref());
        }
        if let Some(price) = patch.price {
            set.push("price = ").push_bind_unseparated(price);
        }
        if let Some(stock) = patch.stock {
            set.push("stock = ").push_bind_unseparated(stock);
        }
        if let Some(is_active) = patch.is_active {
            set.push("is_active = ").push_bind_unseparated(is_active);
        }
        set.push("updated_at = NOW()");

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        let row = qb
            .build_query_as::<ProductRow>()
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        tracing::info!("product updated");
        Product::try_from(row)
    }

    /// Delete a product that no order references.
    ///
    /// Cart lines holding the product are removed with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist, or
    /// `RepositoryError::Conflict` if an order references it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "DELETE FROM shop.product WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::Conflict(
                    "product has been ordered and cannot be deleted; archive it instead"
                        .to_owned(),
                );
            }
            RepositoryError::Database(e)
        })?
        .ok_or(RepositoryError::NotFound)?;

        tracing::info!("product deleted");
        Product::try_from(row)
    }

    /// Point the product at a new image, returning the previous storage key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_image(
        &self,
        id: ProductId,
        key: Option<&str>,
        url: Option<&str>,
    ) -> Result<(Product, Option<String>), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT image_key FROM shop.product WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let previous = previous.ok_or(RepositoryError::NotFound)?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product
            SET image_key = $2, image_url = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(key)
        .bind(url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((Product::try_from(row)?, previous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_sql() {
        let filter = ProductFilter {
            q: Some("jam".to_owned()),
            active: Some(false),
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM shop.product");
        filter.push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM shop.product WHERE TRUE AND name ILIKE $1 AND is_active = $2"
        );
    }

    #[test]
    fn test_empty_filter_sql() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM shop.product");
        ProductFilter::default().push_where(&mut qb);
        assert_eq!(qb.sql(), "SELECT 1 FROM shop.product WHERE TRUE");
    }
}
