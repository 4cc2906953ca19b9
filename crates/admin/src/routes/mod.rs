//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /auth/login                  - Password login (admins only)
//! POST   /auth/logout                 - End session
//! GET    /auth/me                     - Current admin
//!
//! # Dashboard
//! GET    /dashboard                   - Counters and revenue
//!
//! # Products
//! GET    /products                    - All products, incl. archived
//! POST   /products                    - Create
//! GET    /products/{id}               - Detail
//! PATCH  /products/{id}               - Partial update
//! DELETE /products/{id}               - Delete (never-ordered products only)
//! POST   /products/{id}/image         - Upload image (multipart)
//! DELETE /products/{id}/image         - Remove image
//!
//! # Inventory
//! GET    /inventory                   - Stock levels, lowest first
//! PUT    /inventory/{id}              - Set stock
//! POST   /inventory/{id}/adjust       - Add or remove units
//!
//! # Orders
//! GET    /orders                      - Filter by status or user
//! GET    /orders/{id}                 - Detail with items
//! POST   /orders/{id}/status          - Lifecycle transition
//!
//! # Users
//! GET    /users                       - Search by email
//! GET    /users/{id}                  - Detail with order count
//! PUT    /users/{id}/admin            - Grant or revoke admin
//! ```
//!
//! Everything except `/auth/login` and `/auth/logout` goes through
//! [`RequireAdmin`](crate::middleware::RequireAdmin).

pub mod auth;
pub mod dashboard;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

use crate::services::storage::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .patch(products::update)
                .delete(products::delete),
        )
        .route(
            "/{id}/image",
            post(products::upload_image)
                .delete(products::remove_image)
                .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + MULTIPART_OVERHEAD)),
        )
}

/// Create the inventory routes router.
pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(inventory::index))
        .route("/{id}", put(inventory::set))
        .route("/{id}/adjust", post(inventory::adjust))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", post(orders::update_status))
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::index))
        .route("/{id}", get(users::show))
        .route("/{id}/admin", put(users::set_admin))
}

/// Create all routes for admin.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .route("/dashboard", get(dashboard::index))
        .nest("/products", product_routes())
        .nest("/inventory", inventory_routes())
        .nest("/orders", order_routes())
        .nest("/users", user_routes())
}
