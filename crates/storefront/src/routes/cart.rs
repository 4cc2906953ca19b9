//! Cart route handlers.
//!
//! Every mutating handler answers with the updated cart so the client never
//! has to re-fetch.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use marketstall_core::cart::{CartError, CartSummary};
use marketstall_core::validation::ValidationError;
use marketstall_core::{ProductId, Quantity};

use crate::db::CartRepository;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Add-to-cart request.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

const fn default_quantity() -> i64 {
    1
}

/// Set-quantity request.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

fn quantity(value: i64) -> Result<Quantity> {
    Quantity::new(value).map_err(|source| {
        ValidationError::Quantity {
            field: "quantity",
            source,
        }
        .into()
    })
}

/// Show the cart.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartSummary>> {
    Ok(Json(CartRepository::new(state.pool()).summary(user.id).await?))
}

/// Total units in the cart.
#[instrument(skip_all)]
pub async fn count(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    let count = CartRepository::new(state.pool()).count(user.id).await?;
    Ok(Json(json!({ "count": count })))
}

/// Add a product, or more units of one already in the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartSummary>> {
    let repo = CartRepository::new(state.pool());
    let merged = repo
        .add(user.id, req.product_id, quantity(req.quantity)?)
        .await?;

    let product_id = req.product_id.to_string();
    let merged = merged.to_string();
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", product_id.as_str()), ("quantity", merged.as_str())]),
    );

    Ok(Json(repo.summary(user.id).await?))
}

/// Replace a line's quantity.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartSummary>> {
    let repo = CartRepository::new(state.pool());
    repo.set_quantity(user.id, product_id, quantity(req.quantity)?)
        .await?;
    Ok(Json(repo.summary(user.id).await?))
}

/// Remove a line.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartSummary>> {
    let repo = CartRepository::new(state.pool());
    if !repo.remove(user.id, product_id).await? {
        return Err(CartError::NotInCart(product_id).into());
    }
    Ok(Json(repo.summary(user.id).await?))
}

/// Empty the cart.
#[instrument(skip_all)]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<StatusCode> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
