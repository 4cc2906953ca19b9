//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use marketstall_core::validation::ValidationError;
use marketstall_core::{Money, Page, Paginated, ProductId};

use crate::db::{ProductFilter, ProductRepository, ProductSort};
use crate::error::{AppError, Result};
use crate::models::Product;
use crate::state::AppState;

/// Catalog query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ProductQuery {
    /// Validate into a repository filter.
    ///
    /// # Errors
    ///
    /// Returns an error for unparseable prices or an inverted range.
    pub fn into_filter(self) -> Result<ProductFilter> {
        let parse = |field: &'static str, raw: Option<String>| -> Result<Option<Money>> {
            raw.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    Money::parse(s).map_err(|source| ValidationError::Money { field, source })
                })
                .transpose()
                .map_err(AppError::from)
        };

        let min_price = parse("min_price", self.min_price)?;
        let max_price = parse("max_price", self.max_price)?;
        if let (Some(min), Some(max)) = (min_price, max_price)
            && min > max
        {
            return Err(AppError::BadRequest(
                "min_price must not exceed max_price".to_owned(),
            ));
        }

        Ok(ProductFilter {
            q: self
                .q
                .map(|q| q.trim().to_owned())
                .filter(|q| !q.is_empty()),
            min_price,
            max_price,
            in_stock: self.in_stock,
            sort: self.sort,
        })
    }
}

/// List active products.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
    Query(page): Query<Page>,
) -> Result<Json<Paginated<Product>>> {
    let filter = query.into_filter()?;
    let products = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(products))
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    state
        .catalog()
        .product(state.pool(), id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}
