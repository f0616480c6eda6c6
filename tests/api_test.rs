mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use common::TestApp;
use stateset_fulfillment::{entities::LineItemRef, metrics::register_metrics};

fn product_body(sku: &str) -> Value {
    json!({
        "sku": sku,
        "name": format!("Product {}", sku),
        "last_purchase_cost": "2.50"
    })
}

fn order_body(warehouse_id: Uuid, product_id: &str, quantity: i32) -> Value {
    json!({
        "warehouse_id": warehouse_id,
        "lines": [{
            "item": { "kind": "product", "id": product_id },
            "quantity": quantity,
            "unit_price": "19.99"
        }]
    })
}

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"]["status"], "up");
}

#[tokio::test]
async fn product_is_created_and_fetched() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::POST, "/api/v1/products", Some(product_body("API-1")), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let id = body["data"]["product"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/products/{}", id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["product"]["sku"], "API-1");
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}", Uuid::new_v4()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn confirming_without_stock_returns_structured_rejection() {
    register_metrics();
    let app = TestApp::new().await;
    let actor = Uuid::new_v4();

    let (_, body) = app
        .request(Method::POST, "/api/v1/products", Some(product_body("API-2")), None)
        .await;
    let product_id = body["data"]["product"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(order_body(app.warehouse_id, &product_id, 3)),
            Some(actor),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["order"]["created_by"], actor.to_string());
    assert_eq!(
        body["data"]["generated_purchase_orders"]
            .as_array()
            .map(Vec::len),
        Some(1)
    );
    let order_id = body["data"]["order"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/confirm", order_id),
            None,
            Some(actor),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "insufficient_stock");
    assert_eq!(body["details"]["available"], 0);
    assert_eq!(body["details"]["requested"], 3);

    let (status, text) = app.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text
        .as_str()
        .unwrap_or_default()
        .contains("fulfillment_stock_rejections_total"));
}

#[tokio::test]
async fn malformed_actor_header_is_rejected() {
    let app = TestApp::new().await;
    let p = app.product("API-3").await;

    let (status, body) = app
        .request_with_actor_header(
            Method::POST,
            "/api/v1/orders",
            Some(order_body(app.warehouse_id, &p.id.to_string(), 1)),
            Some("not-a-uuid"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn out_of_order_transition_is_a_conflict() {
    let app = TestApp::new().await;
    let p = app.product("API-4").await;
    let placed = app
        .place_order(&[(LineItemRef::Product(p.id), 1)])
        .await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/mark-ready", placed.order.id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "document_state_conflict");
    assert_eq!(body["details"]["state"], "pending");
}

#[tokio::test]
async fn purchase_is_received_and_cancelled_over_http() {
    let app = TestApp::new().await;
    let p = app.product("API-5").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/purchases",
            Some(json!({
                "supplier_id": Uuid::new_v4(),
                "warehouse_id": app.warehouse_id,
                "lines": [
                    { "product_id": p.id, "quantity": 2, "unit_cost": "4.00" },
                    { "product_id": p.id, "quantity": 3, "unit_cost": "4.00" }
                ]
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(app.level(p.id).await.on_hand, 5);
    let id = body["data"]["purchase"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/purchases/{}/cancel", id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["purchase"]["status"], "cancelled");
    assert_eq!(app.level(p.id).await.on_hand, 0);
}
