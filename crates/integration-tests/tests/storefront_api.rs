//! Storefront router tests that need no database.
//!
//! The pool points at a closed port, so these cover everything decided
//! before a query runs: routing, auth guards, validation and middleware.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use marketstall_integration_tests::{TestClient, storefront_app, unreachable_pool};

fn client() -> TestClient {
    TestClient::new(storefront_app(unreachable_pool()))
}

#[tokio::test]
async fn test_health() {
    let resp = client().get("/health").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "ok");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let resp = client().get("/health/ready").await;
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_customer_routes_require_login() {
    let mut client = client();

    for uri in ["/cart", "/cart/count", "/auth/me", "/account/orders", "/account/profile"] {
        let resp = client.get(uri).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "GET {uri}");
    }

    let resp = client
        .post("/cart/items", json!({ "product_id": 1, "quantity": 1 }))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = client
        .post(
            "/checkout",
            json!({ "shipping_name": "A", "shipping_address": "B" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validates_before_touching_database() {
    let mut client = client();

    let resp = client
        .post(
            "/auth/register",
            json!({ "email": "not-an-email", "password": "long enough password" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["error"], "Invalid email address");

    let resp = client
        .post(
            "/auth/register",
            json!({ "email": "shopper@example.com", "password": "short" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(!client.has_session());
}

#[tokio::test]
async fn test_catalog_rejects_bad_price_filters() {
    let mut client = client();

    let resp = client.get("/products?min_price=cheap").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = client.get("/products?min_price=10&max_price=5").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["error"], "Bad request: min_price must not exceed max_price");
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let mut client = client();
    let resp = client.get("/health").await;

    assert_eq!(resp.header("x-frame-options"), Some("DENY"));
    assert_eq!(resp.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(resp.header("cache-control"), Some("no-store, max-age=0"));
    assert!(resp.header("x-request-id").is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_upstream_request_id_is_echoed() {
    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "edge-1234")
        .body(axum::body::Body::empty())
        .unwrap();

    let resp = client().dispatch(request).await;
    assert_eq!(resp.header("x-request-id"), Some("edge-1234"));
}

#[tokio::test]
async fn test_unknown_route() {
    let resp = client().get("/definitely/not/here").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
