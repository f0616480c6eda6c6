mod common;

use assert_matches::assert_matches;

use common::TestApp;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use stateset_fulfillment::{
    entities::{
        inventory_balance, serialized_unit::UnitState, stock_movement::MovementReason,
        LineItemRef,
    },
    errors::ServiceError,
    services::{collaborators::Actor, inventory::AdjustInventoryRequest},
};
use uuid::Uuid;

fn adjustment(
    app: &TestApp,
    product_id: Uuid,
    delta: i32,
    serials: &[&str],
) -> AdjustInventoryRequest {
    AdjustInventoryRequest {
        product_id,
        warehouse_id: app.warehouse_id,
        delta,
        reason: "cycle count".to_string(),
        serials: serials.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test]
async fn adjustments_move_on_hand_and_leave_a_ledger_trail() {
    let app = TestApp::new().await;
    let p = app.product("P").await;
    let actor = Actor::user(Uuid::new_v4());

    app.services
        .inventory
        .adjust(adjustment(&app, p.id, 7, &[]), actor)
        .await
        .unwrap();
    let result = app
        .services
        .inventory
        .adjust(adjustment(&app, p.id, -2, &[]), actor)
        .await
        .unwrap();
    assert_eq!(result.level.on_hand, 5);

    let movements = app
        .services
        .inventory
        .movements(p.id, app.warehouse_id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 2);
    assert_eq!(movements.iter().map(|m| m.quantity).sum::<i32>(), 5);
    assert!(movements
        .iter()
        .any(|m| m.reason == MovementReason::AdjustmentDecrease && m.quantity == -2));
    assert!(movements.iter().all(|m| m.created_by == actor.id()));
    assert!(movements
        .iter()
        .all(|m| m.notes.as_deref() == Some("cycle count")));
}

#[tokio::test]
async fn decrease_cannot_eat_into_reserved_stock() {
    let app = TestApp::new().await;
    let p = app.product("P").await;
    app.stock(p.id, 5).await;
    let placed = app.place_order(&[(LineItemRef::Product(p.id), 3)]).await;
    app.services
        .orders
        .confirm(placed.order.id, Actor::system())
        .await
        .unwrap();

    let err = app
        .services
        .inventory
        .adjust(adjustment(&app, p.id, -3, &[]), Actor::system())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            available: 2,
            requested: 3,
            ..
        }
    );
    let level = app.level(p.id).await;
    assert_eq!((level.on_hand, level.reserved), (5, 3));
    app.assert_invariants().await;
}

#[tokio::test]
async fn zero_delta_is_rejected() {
    let app = TestApp::new().await;
    let p = app.product("P").await;

    let err = app
        .services
        .inventory
        .adjust(adjustment(&app, p.id, 0, &[]), Actor::system())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn kits_are_not_adjusted_directly() {
    let app = TestApp::new().await;
    let a = app.product("A").await;
    let k = app.kit("K", &[(a.id, 2)]).await;

    let err = app
        .services
        .inventory
        .adjust(adjustment(&app, k.id, 1, &[]), Actor::system())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn serialized_increase_registers_units() {
    let app = TestApp::new().await;
    let s = app.serialized_product("S").await;

    let result = app
        .services
        .inventory
        .adjust(adjustment(&app, s.id, 2, &["A-1", " A-2 "]), Actor::system())
        .await
        .unwrap();

    assert_eq!(result.level.on_hand, 2);
    let serials: Vec<&str> = result
        .serial_units
        .iter()
        .map(|u| u.serial_number.as_str())
        .collect();
    assert_eq!(serials, vec!["A-1", "A-2"]);
    assert!(result
        .serial_units
        .iter()
        .all(|u| u.state == UnitState::InStock && u.originating_purchase_id.is_none()));
}

#[tokio::test]
async fn serialized_adjustment_needs_one_serial_per_unit() {
    let app = TestApp::new().await;
    let s = app.serialized_product("S").await;

    let err = app
        .services
        .inventory
        .adjust(adjustment(&app, s.id, 3, &["A-1"]), Actor::system())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::MissingSerials {
            expected: 3,
            supplied: 1,
            ..
        }
    );
    assert_eq!(app.level(s.id).await.on_hand, 0);
}

#[tokio::test]
async fn serialized_decrease_writes_units_off() {
    let app = TestApp::new().await;
    let s = app.serialized_product("S").await;
    app.receive(s.id, 3, &["B-1", "B-2", "B-3"]).await;

    let result = app
        .services
        .inventory
        .adjust(adjustment(&app, s.id, -1, &["B-2"]), Actor::system())
        .await
        .unwrap();
    assert_eq!(result.level.on_hand, 2);

    let units = app.units(s.id).await;
    let b2 = units.iter().find(|u| u.serial_number == "B-2").unwrap();
    assert_eq!(b2.state, UnitState::WrittenOff);

    // A written-off unit never comes back.
    let err = app
        .services
        .inventory
        .adjust(adjustment(&app, s.id, -1, &["B-2"]), Actor::system())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::SerialNotAvailable { .. });
    let err = app
        .services
        .inventory
        .adjust(adjustment(&app, s.id, 1, &["B-2"]), Actor::system())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DuplicateSerial { ref serial, .. } if serial == "B-2");
    app.assert_invariants().await;
}

#[tokio::test]
async fn duplicate_serials_in_one_request_are_rejected() {
    let app = TestApp::new().await;
    let s = app.serialized_product("S").await;

    let err = app
        .services
        .inventory
        .adjust(adjustment(&app, s.id, 2, &["C-1", "C-1"]), Actor::system())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DuplicateSerial { .. });
    assert!(app.units(s.id).await.is_empty());
}

#[tokio::test]
async fn delta_outside_one_million_is_rejected() {
    let app = TestApp::new().await;
    let p = app.product("P").await;

    for delta in [i32::MIN, -1_000_001, 1_000_001] {
        let err = app
            .services
            .inventory
            .adjust(adjustment(&app, p.id, delta, &[]), Actor::system())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }
    assert_eq!(app.level(p.id).await.on_hand, 0);
}

#[tokio::test]
async fn increase_past_i32_max_is_rejected_without_writing() {
    let app = TestApp::new().await;
    let p = app.product("P").await;
    app.stock(p.id, 1).await;
    inventory_balance::Entity::update_many()
        .col_expr(inventory_balance::Column::OnHand, Expr::value(i32::MAX))
        .filter(inventory_balance::Column::ProductId.eq(p.id))
        .exec(app.db.as_ref())
        .await
        .unwrap();

    let err = app
        .services
        .inventory
        .adjust(adjustment(&app, p.id, 1, &[]), Actor::system())
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("exceed"));
    assert_eq!(app.level(p.id).await.on_hand, i32::MAX);
    let movements = app
        .services
        .inventory
        .movements(p.id, app.warehouse_id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
}
