//! Admin router tests that need no database.

use axum::http::{Method, StatusCode};
use serde_json::json;

use marketstall_integration_tests::{TestClient, admin_app, unreachable_pool};

fn client() -> TestClient {
    TestClient::new(admin_app(unreachable_pool()))
}

#[tokio::test]
async fn test_health() {
    let resp = client().get("/health").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "ok");
}

#[tokio::test]
async fn test_every_back_office_route_requires_login() {
    let mut client = client();

    let cases = [
        (Method::GET, "/auth/me"),
        (Method::GET, "/dashboard"),
        (Method::GET, "/products"),
        (Method::GET, "/products/1"),
        (Method::DELETE, "/products/1"),
        (Method::DELETE, "/products/1/image"),
        (Method::GET, "/inventory"),
        (Method::GET, "/orders"),
        (Method::GET, "/orders/1"),
        (Method::GET, "/users"),
        (Method::GET, "/users/1"),
    ];
    for (method, uri) in cases {
        let resp = client.send(method.clone(), uri, None).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(resp.body["error"], "authentication required");
    }

    let writes = [
        (Method::POST, "/products", json!({ "name": "Jam", "price": "3.00" })),
        (Method::PATCH, "/products/1", json!({ "stock": 4 })),
        (Method::PUT, "/inventory/1", json!({ "stock": 4 })),
        (Method::POST, "/inventory/1/adjust", json!({ "delta": -1 })),
        (Method::POST, "/orders/1/status", json!({ "status": "shipped" })),
        (Method::PUT, "/users/1/admin", json!({ "is_admin": true })),
    ];
    for (method, uri, body) in writes {
        let resp = client.send(method.clone(), uri, Some(body)).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
}

#[tokio::test]
async fn test_login_with_malformed_email_is_plain_invalid_credentials() {
    let resp = client()
        .post(
            "/auth/login",
            json!({ "email": "nobody", "password": "whatever-password" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_logout_without_session() {
    let resp = client().post("/auth/logout", json!({})).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_responses_are_never_cached_or_indexed() {
    let resp = client().get("/dashboard").await;
    assert_eq!(resp.header("cache-control"), Some("no-store, max-age=0"));
    assert_eq!(resp.header("x-robots-tag"), Some("noindex, nofollow"));
    assert_eq!(resp.header("x-frame-options"), Some("DENY"));
    assert!(resp.header("x-request-id").is_some());
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let resp = client().get("/health/ready").await;
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
}
