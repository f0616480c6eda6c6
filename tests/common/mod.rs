#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::EntityTrait;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use stateset_fulfillment::{
    config::AppConfig,
    db::{self, DbConfig, DbPool},
    entities::{inventory_balance, product, serialized_unit, LineItemRef},
    events::{self, EventSender},
    handlers::ACTOR_HEADER,
    services::{
        catalog::{CreateProductRequest, KitComponentInput},
        collaborators::{Actor, FixedClock},
        inventory::AdjustInventoryRequest,
        lines::LineInput,
        orders::{CreateOrderRequest, PlacedOrder},
        purchases::{PurchaseDetail, ReceiveLine, ReceivePurchaseRequest},
        stock_ledger::StockLevel,
        AppServices, ServiceContext,
    },
    AppState,
};

/// Fallback supplier for products without a default one.
pub const GENERIC_SUPPLIER: Uuid = Uuid::from_u128(0x6e6e_0001);
/// Supplier used when seeding purchases.
pub const SUPPLIER: Uuid = Uuid::from_u128(0x5u128 << 64);

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
}

/// Services wired over a fresh in-memory SQLite database.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub ctx: ServiceContext,
    pub services: AppServices,
    pub state: AppState,
    pub warehouse_id: Uuid,
    router: Router,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        // One connection: every in-memory connection is its own database.
        let pool = db::establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let ctx = ServiceContext::new(db.clone(), event_sender, GENERIC_SUPPLIER)
            .with_clock(Arc::new(FixedClock(fixed_now())));
        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            generic_supplier_id: GENERIC_SUPPLIER,
            lock_retry_initial_delay_ms: 1,
            lock_retry_max_delay_ms: 5,
            ..AppConfig::default()
        };
        let state = AppState::with_context(ctx.clone(), config);
        let router = stateset_fulfillment::router(state.clone());

        Self {
            db,
            services: state.services.clone(),
            ctx,
            state,
            warehouse_id: Uuid::new_v4(),
            router,
            _event_task: event_task,
        }
    }

    pub async fn create_product(&self, request: CreateProductRequest) -> product::Model {
        self.services
            .catalog
            .create(request)
            .await
            .expect("create product")
            .product
    }

    pub async fn product(&self, sku: &str) -> product::Model {
        self.create_product(product_request(sku)).await
    }

    pub async fn serialized_product(&self, sku: &str) -> product::Model {
        self.create_product(CreateProductRequest {
            is_serialized: true,
            ..product_request(sku)
        })
        .await
    }

    pub async fn supplied_product(&self, sku: &str, supplier_id: Uuid) -> product::Model {
        self.create_product(CreateProductRequest {
            default_supplier_id: Some(supplier_id),
            last_purchase_cost: Decimal::new(350, 2),
            ..product_request(sku)
        })
        .await
    }

    pub async fn kit(&self, sku: &str, components: &[(Uuid, i32)]) -> product::Model {
        self.create_product(CreateProductRequest {
            is_kit: true,
            components: components
                .iter()
                .map(|(product_id, quantity_per_unit)| KitComponentInput {
                    product_id: *product_id,
                    quantity_per_unit: *quantity_per_unit,
                })
                .collect(),
            ..product_request(sku)
        })
        .await
    }

    /// Puts non-serialized stock on hand through a manual adjustment.
    pub async fn stock(&self, product_id: Uuid, quantity: i32) -> StockLevel {
        self.services
            .inventory
            .adjust(
                AdjustInventoryRequest {
                    product_id,
                    warehouse_id: self.warehouse_id,
                    delta: quantity,
                    reason: "initial count".to_string(),
                    serials: Vec::new(),
                },
                Actor::system(),
            )
            .await
            .expect("seed stock")
            .level
    }

    /// Receives a single-line purchase; `serials` must match `quantity` for serialized products.
    pub async fn receive(
        &self,
        product_id: Uuid,
        quantity: i32,
        serials: &[&str],
    ) -> PurchaseDetail {
        self.services
            .purchases
            .receive(
                receive_request(self.warehouse_id, product_id, quantity, serials),
                Actor::system(),
            )
            .await
            .expect("receive purchase")
    }

    pub async fn level(&self, product_id: Uuid) -> StockLevel {
        self.services
            .inventory
            .stock_level(product_id, self.warehouse_id)
            .await
            .expect("stock level")
    }

    pub async fn place_order(&self, lines: &[(LineItemRef, i32)]) -> PlacedOrder {
        self.services
            .orders
            .create(
                CreateOrderRequest {
                    warehouse_id: self.warehouse_id,
                    lines: line_inputs(lines),
                    notes: None,
                },
                Actor::system(),
            )
            .await
            .expect("create order")
    }

    pub async fn units(&self, product_id: Uuid) -> Vec<serialized_unit::Model> {
        self.services
            .inventory
            .serial_units(product_id)
            .await
            .expect("serial units")
    }

    /// Checks `on_hand - reserved >= 0` on every balance row and that no
    /// serial number is in stock twice for a product.
    pub async fn assert_invariants(&self) {
        let balances = inventory_balance::Entity::find()
            .all(self.db.as_ref())
            .await
            .expect("balances");
        for b in &balances {
            assert!(
                b.on_hand - b.reserved >= 0,
                "negative availability for product {}: on_hand {}, reserved {}",
                b.product_id,
                b.on_hand,
                b.reserved
            );
            assert!(b.reserved >= 0, "negative reservation for {}", b.product_id);
        }

        let units = serialized_unit::Entity::find()
            .all(self.db.as_ref())
            .await
            .expect("units");
        let mut seen = std::collections::HashSet::new();
        for u in units
            .iter()
            .filter(|u| u.state == serialized_unit::UnitState::InStock)
        {
            assert!(
                seen.insert((u.product_id, u.serial_number.clone())),
                "serial {} in stock twice",
                u.serial_number
            );
        }
    }

    /// Sends a request through the full router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        actor: Option<Uuid>,
    ) -> (StatusCode, Value) {
        let actor = actor.map(|id| id.to_string());
        self.request_with_actor_header(method, uri, body, actor.as_deref())
            .await
    }

    /// Like [`TestApp::request`] but with the raw actor header value.
    pub async fn request_with_actor_header(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        actor: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header(ACTOR_HEADER, actor);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }
}

pub fn product_request(sku: &str) -> CreateProductRequest {
    CreateProductRequest {
        sku: sku.to_string(),
        name: format!("Product {}", sku),
        is_serialized: false,
        is_kit: false,
        default_supplier_id: None,
        last_purchase_cost: Decimal::new(250, 2),
        components: Vec::new(),
    }
}

pub fn line_inputs(lines: &[(LineItemRef, i32)]) -> Vec<LineInput> {
    lines
        .iter()
        .map(|(item, quantity)| LineInput {
            item: *item,
            quantity: *quantity,
            unit_price: Decimal::new(1999, 2),
        })
        .collect()
}

pub fn receive_request(
    warehouse_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    serials: &[&str],
) -> ReceivePurchaseRequest {
    ReceivePurchaseRequest {
        supplier_id: SUPPLIER,
        warehouse_id,
        purchase_order_id: None,
        bank_account_id: None,
        lines: vec![ReceiveLine {
            product_id,
            quantity,
            unit_cost: Decimal::new(500, 2),
            serials: serials.iter().map(|s| s.to_string()).collect(),
        }],
        notes: None,
    }
}
