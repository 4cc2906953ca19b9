//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (rate limited)
//! POST   /auth/register               - Create account and log in
//! POST   /auth/login                  - Password login
//! POST   /auth/logout                 - End session
//! GET    /auth/me                     - Current user
//!
//! # Catalog
//! GET    /products                    - Search, filter, sort, paginate
//! GET    /products/{id}               - Product detail
//!
//! # Cart (requires auth)
//! GET    /cart                        - Lines and subtotal
//! DELETE /cart                        - Empty the cart
//! GET    /cart/count                  - Total units
//! POST   /cart/items                  - Add product
//! PATCH  /cart/items/{product_id}     - Set quantity
//! DELETE /cart/items/{product_id}     - Remove line
//!
//! # Checkout (requires auth)
//! POST   /checkout                    - Place order from cart or a single product
//!
//! # Account (requires auth)
//! GET    /account/orders              - Order history
//! GET    /account/orders/{id}         - Order detail
//! POST   /account/orders/{id}/cancel  - Cancel a pending order
//! GET    /account/profile             - Profile
//! PATCH  /account/profile             - Update display name
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod products;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/count", get(cart::count))
        .route("/items", post(cart::add))
        .route(
            "/items/{product_id}",
            patch(cart::update).delete(cart::remove),
        )
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
        .route("/orders/{id}/cancel", post(account::cancel_order))
        .route(
            "/profile",
            get(account::profile).patch(account::update_profile),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::place_order))
        .nest("/account", account_routes())
}
