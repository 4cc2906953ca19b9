//! Inventory route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use marketstall_core::{Page, Paginated, ProductId};

use crate::db::{InventoryFilter, InventoryRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::InventoryItem;
use crate::state::AppState;

/// Inventory query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    #[serde(default)]
    pub low_stock: bool,
}

/// Relative stock change.
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i32,
}

/// Absolute stock level.
#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub stock: i32,
}

/// Products ordered by stock, lowest first.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<InventoryQuery>,
    Query(page): Query<Page>,
) -> Result<Json<Paginated<InventoryItem>>> {
    let items = InventoryRepository::new(state.pool(), state.config().low_stock_threshold)
        .list(
            InventoryFilter {
                low_stock: query.low_stock,
            },
            page,
        )
        .await?;
    Ok(Json(items))
}

/// Add or remove units.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn adjust(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<InventoryItem>> {
    if req.delta == 0 {
        return Err(AppError::BadRequest("delta must not be zero".to_owned()));
    }

    let item = InventoryRepository::new(state.pool(), state.config().low_stock_threshold)
        .adjust(id, req.delta)
        .await?;

    add_breadcrumb("inventory", &format!("adjusted product {id} by {}", req.delta));
    Ok(Json(item))
}

/// Overwrite the stock level.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<InventoryItem>> {
    let item = InventoryRepository::new(state.pool(), state.config().low_stock_threshold)
        .set(id, req.stock)
        .await?;

    add_breadcrumb("inventory", &format!("set product {id} stock to {}", req.stock));
    Ok(Json(item))
}
