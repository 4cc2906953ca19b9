//! Account route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use marketstall_core::{OrderId, Page, Paginated, validation};

use crate::db::{OrderRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderSummary, User};
use crate::state::AppState;

/// Profile update. A blank display name clears it.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
}

/// Order history, newest first.
#[instrument(skip(state, user))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(page): Query<Page>,
) -> Result<Json<Paginated<OrderSummary>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id, page)
        .await?;
    Ok(Json(orders))
}

/// One order with its items. Other users' orders are reported as missing.
#[instrument(skip(state, user))]
pub async fn order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    OrderRepository::new(state.pool())
        .get_for_user(user.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// Cancel a pending order.
#[instrument(skip(state, user))]
pub async fn cancel_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool()).cancel(user.id, id).await?;

    for item in &order.items {
        state.catalog().invalidate(item.product_id).await;
    }

    Ok(Json(order))
}

/// The shopper's profile.
#[instrument(skip_all)]
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<User>> {
    UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("user".to_owned()))
}

/// Update the display name.
#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let display_name = req
        .display_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(validation::display_name)
        .transpose()?;

    let user = UserRepository::new(state.pool())
        .update_display_name(user.id, display_name.as_deref())
        .await?;
    Ok(Json(user))
}
