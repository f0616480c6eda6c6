mod common;

use assert_matches::assert_matches;

use common::{line_inputs, product_request, TestApp};
use stateset_fulfillment::{
    entities::LineItemRef,
    errors::ServiceError,
    services::{
        catalog::{CreateProductRequest, KitComponentInput},
        collaborators::Actor,
        orders::CreateOrderRequest,
    },
};

#[tokio::test]
async fn kit_keeps_its_component_order() {
    let app = TestApp::new().await;
    let a = app.product("A").await;
    let b = app.product("B").await;
    let k = app.kit("K", &[(b.id, 1), (a.id, 2)]).await;

    let detail = app.services.catalog.get(k.id).await.unwrap();
    assert!(detail.product.is_kit);
    let components: Vec<_> = detail
        .components
        .iter()
        .map(|c| (c.component_product_id, c.quantity_per_unit))
        .collect();
    assert_eq!(components, vec![(b.id, 1), (a.id, 2)]);
}

#[tokio::test]
async fn kit_cannot_be_serialized() {
    let app = TestApp::new().await;
    let a = app.product("A").await;

    let err = app
        .services
        .catalog
        .create(CreateProductRequest {
            is_kit: true,
            is_serialized: true,
            components: vec![KitComponentInput {
                product_id: a.id,
                quantity_per_unit: 1,
            }],
            ..product_request("K")
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn kits_do_not_nest() {
    let app = TestApp::new().await;
    let a = app.product("A").await;
    let inner = app.kit("INNER", &[(a.id, 1)]).await;

    let err = app
        .services
        .catalog
        .create(CreateProductRequest {
            is_kit: true,
            components: vec![KitComponentInput {
                product_id: inner.id,
                quantity_per_unit: 1,
            }],
            ..product_request("OUTER")
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("INNER"));
}

#[tokio::test]
async fn sku_is_unique() {
    let app = TestApp::new().await;
    app.product("DUP").await;

    let err = app
        .services
        .catalog
        .create(product_request("DUP"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("DUP"));
}

#[tokio::test]
async fn kit_expansion_past_i32_max_is_rejected() {
    let app = TestApp::new().await;
    let a = app.product("A").await;
    let k = app.kit("BULK", &[(a.id, 10_000)]).await;

    let err = app
        .services
        .orders
        .create(
            CreateOrderRequest {
                warehouse_id: app.warehouse_id,
                lines: line_inputs(&[(LineItemRef::Kit(k.id), 1_000_000)]),
                notes: None,
            },
            Actor::system(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("out of range"));
    assert_eq!(app.level(a.id).await.reserved, 0);
}
