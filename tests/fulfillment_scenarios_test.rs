mod common;

use std::collections::HashMap;

use assert_matches::assert_matches;
use sea_orm::EntityTrait;

use common::{TestApp, GENERIC_SUPPLIER};
use stateset_fulfillment::{
    entities::{
        order::OrderStatus, purchase::PurchaseStatus, serialized_unit, serialized_unit::UnitState,
        stock_movement::MovementReason, LineItemRef,
    },
    errors::ServiceError,
    services::{
        collaborators::Actor,
        finance::PayableReversal,
        orders::ConvertOrderToSaleRequest,
        purchases::Reconciliation,
        quotes::{ConvertQuoteToSaleRequest, CreateQuoteRequest},
    },
};
use uuid::Uuid;

#[tokio::test]
async fn second_confirmation_beyond_available_is_rejected() {
    let app = TestApp::new().await;
    let x = app.product("X").await;
    app.stock(x.id, 10).await;

    let first = app.place_order(&[(LineItemRef::Product(x.id), 4)]).await;
    let confirmed = app
        .services
        .orders
        .confirm(first.order.id, Actor::system())
        .await
        .unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);

    let level = app.level(x.id).await;
    assert_eq!((level.on_hand, level.reserved, level.available), (10, 4, 6));

    let second = app.place_order(&[(LineItemRef::Product(x.id), 7)]).await;
    let err = app
        .services
        .orders
        .confirm(second.order.id, Actor::system())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            available: 6,
            requested: 7,
            ..
        }
    );

    let level = app.level(x.id).await;
    assert_eq!(level.reserved, 4);
    let second = app.services.orders.get(second.order.id).await.unwrap();
    assert_eq!(second.order.status, OrderStatus::Pending);
    app.assert_invariants().await;
}

#[tokio::test]
async fn selling_serialized_order_marks_units_sold() {
    let app = TestApp::new().await;
    let y = app.serialized_product("Y").await;
    app.receive(y.id, 2, &["SN1", "SN2"]).await;

    let placed = app.place_order(&[(LineItemRef::Product(y.id), 2)]).await;
    app.services
        .orders
        .confirm(placed.order.id, Actor::system())
        .await
        .unwrap();

    let line_id = placed.items[0].id;
    let request = ConvertOrderToSaleRequest {
        serials: HashMap::from([(line_id, vec!["SN1".to_string(), "SN2".to_string()])]),
        force: false,
    };
    let conversion = app
        .services
        .orders
        .convert_to_sale(placed.order.id, &request, Actor::system())
        .await
        .unwrap();
    assert!(conversion.created);
    let sale = &conversion.detail.sale;
    assert_eq!(sale.order_id, Some(placed.order.id));
    assert_eq!(conversion.detail.serials.len(), 2);

    let units = app.units(y.id).await;
    assert_eq!(units.len(), 2);
    for unit in &units {
        assert_eq!(unit.state, UnitState::Sold);
        assert_eq!(unit.sale_id, Some(sale.id));
    }

    let level = app.level(y.id).await;
    assert_eq!((level.on_hand, level.reserved), (0, 0));
    let order = app.services.orders.get(placed.order.id).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::SentToSale);
    app.assert_invariants().await;
}

#[tokio::test]
async fn cancelling_serialized_purchase_deletes_units_and_reverses_payable() {
    let app = TestApp::new().await;
    let z = app.serialized_product("Z").await;
    let purchase = app.receive(z.id, 3, &["SN10", "SN11", "SN12"]).await;
    assert_eq!(app.level(z.id).await.on_hand, 3);

    let cancellation = app
        .services
        .purchases
        .cancel(purchase.purchase.id, Actor::system())
        .await
        .unwrap();

    assert_eq!(cancellation.purchase.status, PurchaseStatus::Cancelled);
    assert_eq!(cancellation.units_deleted, 3);
    assert!(cancellation.reconciliations.is_empty());
    assert_eq!(cancellation.payable, PayableReversal::Deleted);
    assert!(app.units(z.id).await.is_empty());
    assert_eq!(app.level(z.id).await.on_hand, 0);

    let detail = app.services.purchases.get(purchase.purchase.id).await.unwrap();
    assert!(detail.payable.is_none());
    app.assert_invariants().await;
}

#[tokio::test]
async fn purchase_with_a_sold_unit_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let z = app.serialized_product("Z").await;
    let purchase = app.receive(z.id, 3, &["SN10", "SN11", "SN12"]).await;

    let quote = app
        .services
        .quotes
        .create(
            CreateQuoteRequest {
                warehouse_id: app.warehouse_id,
                lines: common::line_inputs(&[(LineItemRef::Product(z.id), 1)]),
                notes: None,
                draft: false,
            },
            Actor::system(),
        )
        .await
        .unwrap();
    let request = ConvertQuoteToSaleRequest {
        serials: HashMap::from([(quote.items[0].id, vec!["SN10".to_string()])]),
    };
    app.services
        .quotes
        .convert_to_sale(quote.quote.id, &request, Actor::system())
        .await
        .unwrap();

    let err = app
        .services
        .purchases
        .cancel(purchase.purchase.id, Actor::system())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::DocumentStateConflict {
            document: "purchase",
            action: "cancel",
            ..
        }
    );

    // Nothing was written.
    let in_stock: Vec<String> = app
        .units(z.id)
        .await
        .into_iter()
        .filter(|u| u.state == UnitState::InStock)
        .map(|u| u.serial_number)
        .collect();
    assert_eq!(in_stock, vec!["SN11".to_string(), "SN12".to_string()]);
    assert_eq!(app.level(z.id).await.on_hand, 2);
    let detail = app.services.purchases.get(purchase.purchase.id).await.unwrap();
    assert_eq!(detail.purchase.status, PurchaseStatus::Processed);
}

#[tokio::test]
async fn missing_unit_is_reconciled_when_purchase_is_cancelled() {
    let app = TestApp::new().await;
    let z = app.serialized_product("Z").await;
    let purchase = app.receive(z.id, 3, &["SN10", "SN11", "SN12"]).await;

    let sn10 = purchase
        .serial_units
        .iter()
        .find(|u| u.serial_number == "SN10")
        .unwrap();
    serialized_unit::Entity::delete_by_id(sn10.id)
        .exec(app.db.as_ref())
        .await
        .unwrap();

    let cancellation = app
        .services
        .purchases
        .cancel(purchase.purchase.id, Actor::system())
        .await
        .unwrap();

    assert_eq!(cancellation.units_deleted, 2);
    assert_eq!(
        cancellation.reconciliations,
        vec![Reconciliation {
            product_id: z.id,
            warehouse_id: app.warehouse_id,
            quantity: 1,
        }]
    );
    assert!(app.units(z.id).await.is_empty());
    assert_eq!(app.level(z.id).await.on_hand, 0);

    let movements = app
        .services
        .inventory
        .movements(z.id, app.warehouse_id)
        .await
        .unwrap();
    let reconciliation: Vec<_> = movements.iter().filter(|m| m.is_reconciliation).collect();
    assert_eq!(reconciliation.len(), 1);
    assert_eq!(reconciliation[0].quantity, -1);
    assert_eq!(reconciliation[0].reason, MovementReason::Reconciliation);
    assert_eq!(reconciliation[0].reference_id, Some(purchase.purchase.id));
    app.assert_invariants().await;
}

#[tokio::test]
async fn kit_order_raises_purchase_order_only_for_short_component() {
    let app = TestApp::new().await;
    let supplier = Uuid::new_v4();
    let a = app.supplied_product("A", supplier).await;
    let b = app.product("B").await;
    let k = app.kit("K", &[(a.id, 2), (b.id, 1)]).await;
    app.stock(a.id, 4).await;
    app.stock(b.id, 10).await;

    let placed = app.place_order(&[(LineItemRef::Kit(k.id), 3)]).await;

    assert_eq!(placed.generated_purchase_orders.len(), 1);
    let po = &placed.generated_purchase_orders[0];
    assert_eq!(po.purchase_order.supplier_id, supplier);
    assert_eq!(po.purchase_order.order_id, Some(placed.order.id));
    assert_eq!(po.items.len(), 1);
    assert_eq!(po.items[0].product_id, a.id);
    assert_eq!(po.items[0].quantity, 2);
    assert_eq!(po.items[0].unit_cost, a.last_purchase_cost);

    // Confirmation still needs all six units of A.
    let err = app
        .services
        .orders
        .confirm(placed.order.id, Actor::system())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            available: 4,
            requested: 6,
            ..
        }
    );
    assert_eq!(app.level(b.id).await.reserved, 0);
}

#[tokio::test]
async fn shortfall_without_default_supplier_goes_to_generic_supplier() {
    let app = TestApp::new().await;
    let c = app.product("C").await;

    let placed = app.place_order(&[(LineItemRef::Product(c.id), 5)]).await;

    assert_eq!(placed.generated_purchase_orders.len(), 1);
    let po = &placed.generated_purchase_orders[0];
    assert_eq!(po.purchase_order.supplier_id, GENERIC_SUPPLIER);
    assert_eq!(po.items[0].quantity, 5);
}

#[tokio::test]
async fn fully_stocked_order_raises_no_purchase_orders() {
    let app = TestApp::new().await;
    let d = app.product("D").await;
    app.stock(d.id, 5).await;

    let placed = app.place_order(&[(LineItemRef::Product(d.id), 5)]).await;
    assert!(placed.generated_purchase_orders.is_empty());
}
