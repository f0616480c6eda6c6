mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;

use common::TestApp;
use stateset_fulfillment::{
    entities::{
        bank_movement::BankMovementKind, payable::PayableStatus, purchase::PurchaseStatus,
        purchase_order::PurchaseOrderStatus, LineItemRef,
    },
    errors::ServiceError,
    services::{
        collaborators::Actor, finance::CreateBankAccountRequest, finance::PayableReversal,
    },
};

#[tokio::test]
async fn cancelling_plain_purchase_reverses_stock() {
    let app = TestApp::new().await;
    let p = app.product("P").await;
    let purchase = app.receive(p.id, 6, &[]).await;
    assert_eq!(app.level(p.id).await.on_hand, 6);
    assert_eq!(
        purchase.payable.as_ref().map(|p| p.status),
        Some(PayableStatus::Pending)
    );

    let cancellation = app
        .services
        .purchases
        .cancel(purchase.purchase.id, Actor::system())
        .await
        .unwrap();

    assert_eq!(cancellation.purchase.status, PurchaseStatus::Cancelled);
    assert!(cancellation
        .purchase
        .notes
        .as_deref()
        .unwrap_or_default()
        .contains("cancelled"));
    assert_eq!(cancellation.units_deleted, 0);
    assert_eq!(app.level(p.id).await.on_hand, 0);
}

#[tokio::test]
async fn reversal_that_would_cut_into_reservations_is_refused() {
    let app = TestApp::new().await;
    let p = app.product("P").await;
    let purchase = app.receive(p.id, 5, &[]).await;
    let placed = app.place_order(&[(LineItemRef::Product(p.id), 2)]).await;
    app.services
        .orders
        .confirm(placed.order.id, Actor::system())
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
        ServiceError::InsufficientStockToReverse {
            on_hand: 5,
            reserved: 2,
            requested: 5,
            ..
        }
    );

    let level = app.level(p.id).await;
    assert_eq!((level.on_hand, level.reserved), (5, 2));
    let purchase = app.services.purchases.get(purchase.purchase.id).await.unwrap();
    assert_eq!(purchase.purchase.status, PurchaseStatus::Processed);
    assert!(purchase.payable.is_some());
}

#[tokio::test]
async fn purchase_can_only_be_cancelled_once() {
    let app = TestApp::new().await;
    let p = app.product("P").await;
    let purchase = app.receive(p.id, 1, &[]).await;
    app.services
        .purchases
        .cancel(purchase.purchase.id, Actor::system())
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
            ..
        }
    );
}

#[tokio::test]
async fn paid_purchase_is_refunded_and_its_purchase_order_reopened() {
    let app = TestApp::new().await;
    let p = app.product("P").await;
    let account = app
        .services
        .bank_accounts
        .create(CreateBankAccountRequest {
            name: "Operating".to_string(),
            opening_balance: Decimal::new(100_00, 2),
        })
        .await
        .unwrap();

    let placed = app.place_order(&[(LineItemRef::Product(p.id), 4)]).await;
    let po = &placed.generated_purchase_orders[0].purchase_order;
    app.services.purchase_orders.mark_sent(po.id).await.unwrap();

    let mut request = common::receive_request(app.warehouse_id, p.id, 4, &[]);
    request.purchase_order_id = Some(po.id);
    request.bank_account_id = Some(account.id);
    let purchase = app
        .services
        .purchases
        .receive(request, Actor::system())
        .await
        .unwrap();

    // 4 x 5.00 paid on receipt
    let payable = purchase.payable.as_ref().unwrap();
    assert_eq!(payable.status, PayableStatus::Paid);
    assert_eq!(payable.amount_paid, Decimal::new(20_00, 2));
    let detail = app.services.bank_accounts.get(account.id).await.unwrap();
    assert_eq!(detail.account.balance, Decimal::new(80_00, 2));
    let closed = app.services.purchase_orders.get(po.id).await.unwrap();
    assert_eq!(closed.purchase_order.status, PurchaseOrderStatus::Closed);
    let product = app.services.catalog.get(p.id).await.unwrap();
    assert_eq!(product.product.last_purchase_cost, Decimal::new(500, 2));

    let cancellation = app
        .services
        .purchases
        .cancel(purchase.purchase.id, Actor::system())
        .await
        .unwrap();

    assert_eq!(cancellation.payable, PayableReversal::Cancelled);
    let refund = cancellation.refund.as_ref().unwrap();
    assert_eq!(refund.kind, BankMovementKind::Deposit);
    assert_eq!(refund.amount, Decimal::new(20_00, 2));
    assert_eq!(
        cancellation.purchase_order.as_ref().map(|po| po.status),
        Some(PurchaseOrderStatus::Pending)
    );

    let detail = app.services.bank_accounts.get(account.id).await.unwrap();
    assert_eq!(detail.account.balance, Decimal::new(100_00, 2));
    assert_eq!(detail.movements.len(), 2);
    let purchase = app.services.purchases.get(purchase.purchase.id).await.unwrap();
    assert_eq!(
        purchase.payable.map(|p| p.status),
        Some(PayableStatus::Cancelled)
    );
}

#[tokio::test]
async fn cancelled_purchase_order_cannot_be_received() {
    let app = TestApp::new().await;
    let p = app.product("P").await;
    let placed = app.place_order(&[(LineItemRef::Product(p.id), 1)]).await;
    let po_id = placed.generated_purchase_orders[0].purchase_order.id;
    app.services
        .purchase_orders
        .cancel(po_id, Some("supplier out of business".to_string()))
        .await
        .unwrap();

    let mut request = common::receive_request(app.warehouse_id, p.id, 1, &[]);
    request.purchase_order_id = Some(po_id);
    let err = app
        .services
        .purchases
        .receive(request, Actor::system())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::DocumentStateConflict {
            document: "purchase order",
            ..
        }
    );
    assert_eq!(app.level(p.id).await.on_hand, 0);
}

#[tokio::test]
async fn serialized_receipt_needs_matching_serials() {
    let app = TestApp::new().await;
    let s = app.serialized_product("S").await;

    let err = app
        .services
        .purchases
        .receive(
            common::receive_request(app.warehouse_id, s.id, 2, &["only-one"]),
            Actor::system(),
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::MissingSerials {
            expected: 2,
            supplied: 1,
            ..
        }
    );

    app.receive(s.id, 1, &["X-1"]).await;
    let err = app
        .services
        .purchases
        .receive(
            common::receive_request(app.warehouse_id, s.id, 1, &["X-1"]),
            Actor::system(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DuplicateSerial { .. });
    assert_eq!(app.level(s.id).await.on_hand, 1);
}
