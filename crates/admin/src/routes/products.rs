//! Product management route handlers.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use marketstall_core::validation::{ProductDraft, ProductPatch};
use marketstall_core::{Page, Paginated, ProductId};

use crate::db::{ProductFilter, ProductRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::Product;
use crate::services::ImageStorage;
use crate::state::AppState;

/// Multipart field carrying the image.
const IMAGE_FIELD: &str = "image";

/// Product list query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub active: Option<bool>,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        Self {
            q: query
                .q
                .map(|q| q.trim().to_owned())
                .filter(|q| !q.is_empty()),
            active: query.active,
        }
    }
}

/// All products, including archived ones.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ProductQuery>,
    Query(page): Query<Page>,
) -> Result<Json<Paginated<Product>>> {
    let products = ProductRepository::new(state.pool())
        .list(&query.into(), page)
        .await?;
    Ok(Json(products))
}

/// Product detail.
#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("product".to_owned()))
}

/// Create a product.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = draft.validate()?;
    let product = ProductRepository::new(state.pool()).create(&product).await?;

    add_breadcrumb("products", &format!("created product {}", product.id));
    Ok((StatusCode::CREATED, Json(product)))
}

/// Partially update a product.
#[instrument(skip(state, admin, patch), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>> {
    let patch = patch.validate()?;
    let product = ProductRepository::new(state.pool()).update(id, &patch).await?;

    add_breadcrumb("products", &format!("updated product {id}"));
    Ok(Json(product))
}

/// Delete a product that was never ordered, along with its image.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    let product = ProductRepository::new(state.pool()).delete(id).await?;

    if let Some(key) = product.image_key.as_deref() {
        discard(state.storage(), key).await;
    }

    add_breadcrumb("products", &format!("deleted product {id}"));
    Ok(StatusCode::NO_CONTENT)
}

/// Upload a new image, replacing the current one.
///
/// Expects `multipart/form-data` with the file in the `image` field.
#[instrument(skip(state, admin, multipart), fields(admin_id = %admin.id))]
pub async fn upload_image(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    mut multipart: Multipart,
) -> Result<Json<Product>> {
    let products = ProductRepository::new(state.pool());
    if products.get(id).await?.is_none() {
        return Err(AppError::NotFound("product".to_owned()));
    }

    let (content_type, bytes) = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
            .ok_or_else(|| AppError::BadRequest(format!("missing '{IMAGE_FIELD}' field")))?;

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_owned)
            .ok_or_else(|| AppError::BadRequest("image has no content type".to_owned()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        break (content_type, bytes);
    };

    let stored = state
        .storage()
        .put_product_image(id, &content_type, &bytes)
        .await?;

    let (product, previous) = match products
        .set_image(id, Some(&stored.key), Some(&stored.url))
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            discard(state.storage(), &stored.key).await;
            return Err(e.into());
        }
    };

    if let Some(previous) = previous.as_deref() {
        discard(state.storage(), previous).await;
    }

    add_breadcrumb("products", &format!("replaced image of product {id}"));
    Ok(Json(product))
}

/// Remove the product's image.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn remove_image(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let (product, previous) = ProductRepository::new(state.pool())
        .set_image(id, None, None)
        .await?;

    if let Some(previous) = previous.as_deref() {
        discard(state.storage(), previous).await;
    }

    Ok(Json(product))
}

/// Delete an object that is no longer referenced. Failures leave an orphan
/// behind and are only logged.
async fn discard(storage: &ImageStorage, key: &str) {
    if let Err(e) = storage.delete(key).await {
        tracing::warn!(key = %key, error = %e, "failed to delete stored image");
    }
}
