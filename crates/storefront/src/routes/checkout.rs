//! Checkout route handler.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use marketstall_core::checkout::CheckoutError;
use marketstall_core::validation::{ShippingDetails, ValidationError};
use marketstall_core::{Money, ProductId, Quantity};

use crate::db::{CartRepository, CheckoutSource, OrderRepository, PlaceOrderError};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::state::AppState;

/// Checkout request.
///
/// Without `product_id` the whole cart is bought; with it, only that product
/// ("buy now") and the cart is left alone.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_name: String,
    pub shipping_address: String,
    pub shipping_phone: Option<String>,
    /// Total the shopper confirmed, as a decimal string.
    pub expected_total: Option<String>,
    pub product_id: Option<ProductId>,
    pub quantity: Option<i64>,
    /// Unit price shown for a buy-now product.
    pub expected_unit_price: Option<String>,
}

fn money(field: &'static str, raw: Option<&str>) -> Result<Option<Money>> {
    raw.map(|s| Money::parse(s).map_err(|source| ValidationError::Money { field, source }))
        .transpose()
        .map_err(AppError::from)
}

impl CheckoutRequest {
    fn source(&self) -> Result<CheckoutSource> {
        let Some(product_id) = self.product_id else {
            return Ok(CheckoutSource::Cart);
        };
        let quantity = Quantity::new(self.quantity.unwrap_or(1)).map_err(|source| {
            ValidationError::Quantity {
                field: "quantity",
                source,
            }
        })?;
        let expected_unit_price =
            money("expected_unit_price", self.expected_unit_price.as_deref())?;
        Ok(CheckoutSource::Direct {
            product_id,
            quantity,
            expected_unit_price,
        })
    }
}

/// Place an order.
#[instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn place_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let shipping = ShippingDetails::parse(
        &req.shipping_name,
        &req.shipping_address,
        req.shipping_phone.as_deref(),
    )?;
    let source = req.source()?;
    let expected_total = money("expected_total", req.expected_total.as_deref())?;

    let result = OrderRepository::new(state.pool())
        .place(user.id, &source, &shipping, expected_total)
        .await;

    let order = match result {
        Ok(order) => order,
        Err(PlaceOrderError::Rejected(CheckoutError::PricesChanged(changes)))
            if source == CheckoutSource::Cart =>
        {
            // Next attempt succeeds once the shopper has seen the new prices.
            CartRepository::new(state.pool())
                .refresh_prices(user.id)
                .await?;
            return Err(CheckoutError::PricesChanged(changes).into());
        }
        Err(e) => return Err(e.into()),
    };

    for item in &order.items {
        state.catalog().invalidate(item.product_id).await;
    }

    let order_id = order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));

    Ok((StatusCode::CREATED, Json(order)))
}
