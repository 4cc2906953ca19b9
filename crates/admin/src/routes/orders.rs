//! Order review and status route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use marketstall_core::{OrderId, OrderStatus, Page, Paginated, UserId};

use crate::db::{OrderFilter, OrderRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderSummary};
use crate::state::AppState;

/// Order list query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
}

/// Body of a status change.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// All orders, newest first.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrderQuery>,
    Query(page): Query<Page>,
) -> Result<Json<Paginated<OrderSummary>>> {
    let filter = OrderFilter {
        status: query.status,
        user_id: query.user_id,
    };
    let orders = OrderRepository::new(state.pool()).list(filter, page).await?;
    Ok(Json(orders))
}

#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("order".to_owned()))
}

/// Move an order along its lifecycle.
///
/// Cancelling returns the order's units to stock.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .update_status(id, req.status)
        .await?;

    add_breadcrumb("orders", &format!("order {id} -> {}", order.status));
    Ok(Json(order))
}
