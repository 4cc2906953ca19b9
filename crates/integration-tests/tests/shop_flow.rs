//! End-to-end flows across the storefront and admin routers.
//!
//! These tests require a migrated `PostgreSQL` database:
//!
//! ```bash
//! DATABASE_URL=$TEST_DATABASE_URL ms-cli migrate
//! TEST_DATABASE_URL=postgres://... cargo test -p marketstall-integration-tests -- --ignored
//! ```
//!
//! Every test creates its own accounts and products with unique names, so
//! runs do not interfere with each other.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use sqlx::PgPool;

use marketstall_core::password::hash_password;
use marketstall_core::validation::ShippingDetails;
use marketstall_core::{ProductId, Quantity, UserId};
use marketstall_storefront::db::{
    CartChangeError, CartRepository, CheckoutSource, OrderRepository, PlaceOrderError,
};
use marketstall_integration_tests::{
    TestClient, admin_app, database_pool, storefront_app, unique_email,
};

const ADMIN_PASSWORD: &str = "correct horse battery staple";

/// Insert an admin account directly and return a logged-in admin client.
async fn logged_in_admin(pool: &PgPool) -> (TestClient, i64) {
    let email = unique_email("admin");
    let hash = hash_password(ADMIN_PASSWORD).unwrap();

    let id: i32 = sqlx::query_scalar(
        r#"INSERT INTO shop."user" (email, password_hash) VALUES ($1, $2) RETURNING id"#,
    )
    .bind(&email)
    .bind(&hash)
    .fetch_one(pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO shop.profile (user_id, is_admin) VALUES ($1, TRUE)")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();

    let mut admin = TestClient::new(admin_app(pool.clone()));
    let resp = admin
        .post(
            "/auth/login",
            json!({ "email": email, "password": ADMIN_PASSWORD }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
    assert_eq!(resp.body["is_admin"], true);
    (admin, i64::from(id))
}

/// Register a shopper and return their logged-in client.
async fn registered_shopper(pool: &PgPool) -> TestClient {
    let mut shopper = TestClient::new(storefront_app(pool.clone()));
    let resp = shopper
        .post(
            "/auth/register",
            json!({
                "email": unique_email("shopper"),
                "password": "shopper password 1",
                "display_name": "Sam",
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
    assert!(shopper.has_session());
    shopper
}

async fn create_product(admin: &mut TestClient, price: &str, stock: i32) -> (i64, String) {
    let name = format!("Test Jam {}", uuid::Uuid::new_v4().simple());
    let resp = admin
        .post(
            "/products",
            json!({ "name": name, "price": price, "stock": stock }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
    (resp.body["id"].as_i64().unwrap(), name)
}

fn stock_of(product: &Value) -> i64 {
    product["stock"].as_i64().unwrap()
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_checkout_reserves_stock_and_cancel_returns_it() {
    let pool = database_pool().await;
    let (mut admin, _) = logged_in_admin(&pool).await;
    let (product_id, _) = create_product(&mut admin, "12.50", 3).await;

    let mut shopper = registered_shopper(&pool).await;
    let resp = shopper
        .post("/cart/items", json!({ "product_id": product_id, "quantity": 2 }))
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
    assert_eq!(resp.body["subtotal"], "25.00");

    let resp = shopper
        .post(
            "/checkout",
            json!({
                "shipping_name": "Sam Shopper",
                "shipping_address": "1 Market Street",
                "expected_total": "25.00",
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
    assert_eq!(resp.body["status"], "pending");
    assert_eq!(resp.body["total"], "25.00");
    let order_id = resp.body["id"].as_i64().unwrap();

    let resp = shopper.get("/cart").await;
    assert_eq!(resp.body["item_count"], 0);

    let resp = admin.get(&format!("/products/{product_id}")).await;
    assert_eq!(stock_of(&resp.body), 1);

    let resp = shopper
        .post(&format!("/account/orders/{order_id}/cancel"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
    assert_eq!(resp.body["status"], "cancelled");

    let resp = admin.get(&format!("/products/{product_id}")).await;
    assert_eq!(stock_of(&resp.body), 3);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_checkout_beyond_stock_is_refused() {
    let pool = database_pool().await;
    let (mut admin, _) = logged_in_admin(&pool).await;
    let (product_id, _) = create_product(&mut admin, "4.00", 1).await;

    let mut shopper = registered_shopper(&pool).await;
    let resp = shopper
        .post(
            "/checkout",
            json!({
                "shipping_name": "Sam Shopper",
                "shipping_address": "1 Market Street",
                "product_id": product_id,
                "quantity": 2,
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT, "{}", resp.body);

    let resp = admin.get(&format!("/products/{product_id}")).await;
    assert_eq!(stock_of(&resp.body), 1);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_admin_order_lifecycle() {
    let pool = database_pool().await;
    let (mut admin, _) = logged_in_admin(&pool).await;
    let (product_id, _) = create_product(&mut admin, "9.99", 5).await;

    let mut shopper = registered_shopper(&pool).await;
    let resp = shopper
        .post(
            "/checkout",
            json!({
                "shipping_name": "Sam Shopper",
                "shipping_address": "1 Market Street",
                "product_id": product_id,
                "quantity": 1,
            }),
        )
        .await;
    let order_id = resp.body["id"].as_i64().unwrap();

    let resp = admin.get(&format!("/orders/{order_id}")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body["customer_email"].as_str().unwrap().starts_with("shopper-"));
    assert_eq!(resp.body["items"][0]["quantity"], 1);

    for status in ["paid", "shipped"] {
        let resp = admin
            .post(&format!("/orders/{order_id}/status"), json!({ "status": status }))
            .await;
        assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
        assert_eq!(resp.body["status"], status);
    }

    let resp = admin
        .post(&format!("/orders/{order_id}/status"), json!({ "status": "cancelled" }))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.body["code"], "invalid_transition");
    assert_eq!(resp.body["details"]["from"], "shipped");

    let resp = shopper
        .post(&format!("/account/orders/{order_id}/cancel"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = admin.get("/orders?status=shipped&per_page=100").await;
    assert!(
        resp.body["items"]
            .as_array()
            .unwrap()
            .iter()
            .any(|o| o["id"] == order_id)
    );
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_inventory_adjustments_never_go_negative() {
    let pool = database_pool().await;
    let (mut admin, _) = logged_in_admin(&pool).await;
    let (product_id, _) = create_product(&mut admin, "1.00", 2).await;

    let resp = admin
        .post(&format!("/inventory/{product_id}/adjust"), json!({ "delta": -3 }))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.body["details"]["current"], 2);

    let resp = admin
        .post(&format!("/inventory/{product_id}/adjust"), json!({ "delta": 4 }))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["stock"], 6);
    assert_eq!(resp.body["low_stock"], false);

    let resp = admin
        .put(&format!("/inventory/{product_id}"), json!({ "stock": -1 }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = admin
        .put(&format!("/inventory/{product_id}"), json!({ "stock": 0 }))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["low_stock"], true);

    let resp = admin.get("/inventory?low_stock=true&per_page=100").await;
    assert!(
        resp.body["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|i| i["stock"].as_i64().unwrap() <= 5)
    );
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_ordered_product_must_be_archived_not_deleted() {
    let pool = database_pool().await;
    let (mut admin, _) = logged_in_admin(&pool).await;
    let (ordered_id, name) = create_product(&mut admin, "3.00", 2).await;
    let (unordered_id, _) = create_product(&mut admin, "3.00", 2).await;

    let mut shopper = registered_shopper(&pool).await;
    let resp = shopper
        .post(
            "/checkout",
            json!({
                "shipping_name": "Sam Shopper",
                "shipping_address": "1 Market Street",
                "product_id": ordered_id,
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);

    let resp = admin.delete(&format!("/products/{ordered_id}")).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert!(resp.body["error"].as_str().unwrap().contains("archive"));

    let resp = admin
        .patch(&format!("/products/{ordered_id}"), json!({ "is_active": false }))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["is_active"], false);

    let query = name.replace(' ', "%20");
    let resp = shopper.get(&format!("/products?q={query}")).await;
    assert_eq!(resp.body["total"], 0);

    let resp = admin.delete(&format!("/products/{unordered_id}")).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    let resp = admin.get(&format!("/products/{unordered_id}")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_admin_flag_is_rechecked_every_request() {
    let pool = database_pool().await;
    let (mut admin, admin_id) = logged_in_admin(&pool).await;
    let (mut other, other_id) = logged_in_admin(&pool).await;

    let resp = admin
        .put(&format!("/users/{admin_id}/admin"), json!({ "is_admin": false }))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = admin
        .put(&format!("/users/{other_id}/admin"), json!({ "is_admin": false }))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["is_admin"], false);

    let resp = other.get("/dashboard").await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = admin.get(&format!("/users/{other_id}")).await;
    assert_eq!(resp.body["order_count"], 0);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_shopper_cannot_log_into_admin() {
    let pool = database_pool().await;
    let email = unique_email("shopper");

    let mut shopper = TestClient::new(storefront_app(pool.clone()));
    let resp = shopper
        .post(
            "/auth/register",
            json!({ "email": email, "password": "shopper password 1" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let mut admin = TestClient::new(admin_app(pool));
    let resp = admin
        .post(
            "/auth/login",
            json!({ "email": email, "password": "shopper password 1" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert!(!admin.has_session());
}

fn multipart_image(content_type: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let boundary = "marketstall-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"image\"; filename=\"jam.png\"\r\n",
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_image_upload_replace_and_remove() {
    let pool = database_pool().await;
    let (mut admin, _) = logged_in_admin(&pool).await;
    let (product_id, _) = create_product(&mut admin, "2.00", 1).await;

    let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    let upload = |content_type: &str, bytes: &[u8]| {
        let (multipart_type, body) = multipart_image(content_type, bytes);
        Request::builder()
            .method("POST")
            .uri(format!("/products/{product_id}/image"))
            .header(header::CONTENT_TYPE, multipart_type)
            .body(Body::from(body))
            .unwrap()
    };

    let resp = admin.dispatch(upload("image/png", png)).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
    let first_url = resp.body["image_url"].as_str().unwrap().to_owned();
    assert!(first_url.starts_with(&format!("/media/products/{product_id}/")));
    assert!(first_url.ends_with(".png"));

    let resp = admin.dispatch(upload("image/png", png)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_ne!(resp.body["image_url"], first_url.as_str());

    let resp = admin.dispatch(upload("image/jpeg", png)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["code"], "invalid_image");

    let resp = admin.dispatch(upload("text/html", b"<html>")).await;
    assert_eq!(resp.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let resp = admin.delete(&format!("/products/{product_id}/image")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["image_url"], Value::Null);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_dashboard_lists_every_status() {
    let pool = database_pool().await;
    let (mut admin, _) = logged_in_admin(&pool).await;

    let resp = admin.get("/dashboard").await;
    assert_eq!(resp.status, StatusCode::OK);
    let statuses: Vec<&str> = resp.body["orders_by_status"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["status"].as_str().unwrap())
        .collect();
    assert_eq!(
        statuses,
        ["pending", "paid", "shipped", "delivered", "cancelled"]
    );
    assert_eq!(resp.body["low_stock_threshold"], 5);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_adding_same_product_twice_increments_quantity() {
    let pool = database_pool().await;
    let (mut admin, _) = logged_in_admin(&pool).await;
    let (product_id, _) = create_product(&mut admin, "2.50", 10).await;

    let mut shopper = registered_shopper(&pool).await;
    let resp = shopper
        .post("/cart/items", json!({ "product_id": product_id, "quantity": 1 }))
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
    assert_eq!(resp.body["lines"][0]["quantity"], 1);

    let resp = shopper
        .post("/cart/items", json!({ "product_id": product_id, "quantity": 2 }))
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
    assert_eq!(resp.body["lines"].as_array().unwrap().len(), 1);
    assert_eq!(resp.body["lines"][0]["quantity"], 3);
    assert_eq!(resp.body["item_count"], 3);
    assert_eq!(resp.body["subtotal"], "7.50");

    let resp = shopper
        .post("/cart/items", json!({ "product_id": product_id, "quantity": 8 }))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT, "{}", resp.body);
    let resp = shopper.get("/cart").await;
    assert_eq!(resp.body["item_count"], 3);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_price_change_refuses_checkout_once_then_uses_new_price() {
    let pool = database_pool().await;
    let (mut admin, _) = logged_in_admin(&pool).await;
    let (product_id, name) = create_product(&mut admin, "5.00", 10).await;

    let mut shopper = registered_shopper(&pool).await;
    let resp = shopper
        .post("/cart/items", json!({ "product_id": product_id, "quantity": 2 }))
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
    assert_eq!(resp.body["lines"][0]["unit_price_snapshot"], "5.00");

    let resp = admin
        .patch(&format!("/products/{product_id}"), json!({ "price": "6.00" }))
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);

    let checkout = json!({
        "shipping_name": "Sam Shopper",
        "shipping_address": "1 Market Street",
    });
    let resp = shopper.post("/checkout", checkout.clone()).await;
    assert_eq!(resp.status, StatusCode::CONFLICT, "{}", resp.body);
    assert_eq!(resp.body["code"], "prices_changed");
    let change = &resp.body["details"]["changes"][0];
    assert_eq!(change["product_id"], product_id);
    assert_eq!(change["name"], name.as_str());
    assert_eq!(change["expected"], "5.00");
    assert_eq!(change["current"], "6.00");

    let resp = admin.get(&format!("/products/{product_id}")).await;
    assert_eq!(stock_of(&resp.body), 10);

    let resp = shopper.post("/checkout", checkout).await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
    assert_eq!(resp.body["total"], "12.00");
    assert_eq!(resp.body["items"][0]["unit_price"], "6.00");

    let resp = admin.get(&format!("/products/{product_id}")).await;
    assert_eq!(stock_of(&resp.body), 8);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_stock_adjustment_past_int_range_is_refused() {
    let pool = database_pool().await;
    let (mut admin, _) = logged_in_admin(&pool).await;
    let (product_id, _) = create_product(&mut admin, "1.00", 10).await;

    let resp = admin
        .post(
            &format!("/inventory/{product_id}/adjust"),
            json!({ "delta": i32::MAX }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{}", resp.body);
    assert_eq!(resp.body["code"], "invalid_input");
    assert_eq!(resp.body["details"]["current"], 10);

    let resp = admin.get(&format!("/products/{product_id}")).await;
    assert_eq!(stock_of(&resp.body), 10);
}

/// Insert a shopper account directly, for tests that drive the repositories.
async fn shopper_id(pool: &PgPool) -> UserId {
    let id: i32 = sqlx::query_scalar(
        r#"INSERT INTO shop."user" (email, password_hash) VALUES ($1, $2) RETURNING id"#,
    )
    .bind(unique_email("shopper"))
    .bind(hash_password("shopper password 1").unwrap())
    .fetch_one(pool)
    .await
    .unwrap();
    UserId::new(id)
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_cart_add_racing_checkout_never_deadlocks() {
    let pool = database_pool().await;
    let (mut admin, _) = logged_in_admin(&pool).await;
    let (first, _) = create_product(&mut admin, "1.00", 10_000).await;
    let (second, _) = create_product(&mut admin, "1.00", 10_000).await;
    let products = [first, second].map(|id| ProductId::new(i32::try_from(id).unwrap()));

    let user = shopper_id(&pool).await;
    let carts = CartRepository::new(&pool);
    let orders = OrderRepository::new(&pool);
    let shipping = ShippingDetails::parse("Sam Shopper", "1 Market Street", None).unwrap();
    let one = Quantity::new(1).unwrap();

    for round in 0..40 {
        for product in products {
            carts.add(user, product, one).await.unwrap();
        }
        // The racing product alternates between first and last in checkout lock order.
        let racing = products[round % 2];
        let (added, placed) = tokio::join!(
            carts.add(user, racing, one),
            orders.place(user, &CheckoutSource::Cart, &shipping, None),
        );
        assert!(
            !matches!(placed, Err(PlaceOrderError::Repository(_))),
            "round {round}: {placed:?}"
        );
        assert!(
            !matches!(added, Err(CartChangeError::Repository(_))),
            "round {round}: {added:?}"
        );
    }
}
