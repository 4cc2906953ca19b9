//! Dashboard route handler.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::db::DashboardRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::DashboardStats;
use crate::state::AppState;

/// Shop-wide counters.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<DashboardStats>> {
    let stats = DashboardRepository::new(state.pool())
        .stats(state.config().low_stock_threshold)
        .await?;
    Ok(Json(stats))
}
