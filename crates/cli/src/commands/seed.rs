//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Strawberry Jam
//!     description: Small batch, 340 g jar
//!     price: "6.50"
//!     stock: 40
//!   - name: Sourdough Loaf
//!     price: "4.20"
//!     is_active: false
//! ```
//!
//! Prices are quoted so they keep their exact decimal value. Products are
//! matched by name: an existing product is updated in place, anything else
//! is inserted. The whole file is validated before the database is touched
//! and applied in a single transaction.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use marketstall_core::validation::{ProductDraft, ValidProduct, ValidationError};

use super::{ConnectError, connect};

/// Top-level layout of a seed file.
#[derive(Debug, Deserialize)]
struct SeedFile {
    products: Vec<ProductDraft>,
}

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} invalid products")]
    Invalid(usize),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Counts reported after a seed run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Parse and validate a seed file's contents.
///
/// Returns every invalid entry, by position and name, so they can all be
/// fixed at once.
fn parse(content: &str) -> Result<Vec<ValidProduct>, ParseFailure> {
    let file: SeedFile = serde_yaml::from_str(content).map_err(ParseFailure::Yaml)?;

    let mut valid = Vec::with_capacity(file.products.len());
    let mut invalid = Vec::new();
    for (index, draft) in file.products.iter().enumerate() {
        match draft.validate() {
            Ok(product) => valid.push(product),
            Err(e) => invalid.push((index, draft.name.clone(), e)),
        }
    }

    if invalid.is_empty() {
        Ok(valid)
    } else {
        Err(ParseFailure::Invalid(invalid))
    }
}

#[derive(Debug)]
enum ParseFailure {
    Yaml(serde_yaml::Error),
    Invalid(Vec<(usize, String, ValidationError)>),
}

/// Upsert products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file is missing or malformed, if any product is
/// invalid, or if a database operation fails.
pub async fn products(file_path: &str) -> Result<SeedSummary, SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::NotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;

    let products = match parse(&content) {
        Ok(products) => products,
        Err(ParseFailure::Yaml(e)) => return Err(e.into()),
        Err(ParseFailure::Invalid(invalid)) => {
            error!("Product validation failed:");
            for (index, name, e) in &invalid {
                error!("  - #{index} ({name}): {e}");
            }
            return Err(SeedError::Invalid(invalid.len()));
        }
    };
    info!(products = products.len(), "Parsed and validated");

    let pool = connect().await?;
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    for product in &products {
        let updated: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE shop.product
            SET description = $2, price = $3, stock = $4, is_active = $5, updated_at = NOW()
            WHERE id = (SELECT id FROM shop.product WHERE name = $1 ORDER BY id LIMIT 1)
            RETURNING id
            ",
        )
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price)
        .bind(product.stock)
        .bind(product.is_active)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_some() {
            summary.updated += 1;
            continue;
        }

        sqlx::query(
            r"
            INSERT INTO shop.product (name, description, price, stock, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price)
        .bind(product.stock)
        .bind(product.is_active)
        .execute(&mut *tx)
        .await?;
        summary.inserted += 1;
    }

    tx.commit().await?;

    info!("Seeding complete!");
    info!("  Products inserted: {}", summary.inserted);
    info!("  Products updated: {}", summary.updated);
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let products = parse(
            r#"
products:
  - name: Strawberry Jam
    price: "6.50"
    stock: 40
  - name: Sourdough Loaf
    description: "  Baked daily  "
    price: "4.20"
    is_active: false
"#,
        )
        .unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].price.to_string(), "6.50");
        assert!(products[0].is_active);
        assert_eq!(products[1].stock, 0);
        assert!(!products[1].is_active);
        assert_eq!(products[1].description.as_deref(), Some("Baked daily"));
    }

    #[test]
    fn test_parse_reports_every_invalid_product() {
        let err = parse(
            r#"
products:
  - name: ""
    price: "1.00"
  - name: Fine
    price: "2.00"
  - name: Negative
    price: "-3.00"
"#,
        )
        .unwrap_err();

        let ParseFailure::Invalid(invalid) = err else {
            panic!("expected validation failure");
        };
        let positions: Vec<usize> = invalid.iter().map(|(i, _, _)| *i).collect();
        assert_eq!(positions, vec![0, 2]);
    }

    #[test]
    fn test_parse_rejects_malformed_yaml() {
        assert!(matches!(parse("products: 7"), Err(ParseFailure::Yaml(_))));
    }
}
