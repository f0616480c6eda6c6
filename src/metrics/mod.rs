use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::errors::ServiceError;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ORDERS_CONFIRMED: IntCounter = IntCounter::new(
        "fulfillment_orders_confirmed_total",
        "Orders whose lines were reserved"
    )
    .expect("metric can be created");
    pub static ref ORDERS_CANCELLED: IntCounter = IntCounter::new(
        "fulfillment_orders_cancelled_total",
        "Orders cancelled, with reservations released"
    )
    .expect("metric can be created");
    pub static ref SALES_CREATED: IntCounterVec = IntCounterVec::new(
        Opts::new("fulfillment_sales_created_total", "Sales recorded by source document"),
        &["source"]
    )
    .expect("metric can be created");
    pub static ref STOCK_REJECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "fulfillment_stock_rejections_total",
            "Operations refused for lack of stock"
        ),
        &["operation"]
    )
    .expect("metric can be created");
    pub static ref PURCHASES_CANCELLED: IntCounter = IntCounter::new(
        "fulfillment_purchases_cancelled_total",
        "Purchases reversed"
    )
    .expect("metric can be created");
    pub static ref RECONCILIATION_MOVEMENTS: IntCounter = IntCounter::new(
        "fulfillment_reconciliation_movements_total",
        "Ledger movements written to reconcile missing serialized units"
    )
    .expect("metric can be created");
    pub static ref SERIAL_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "fulfillment_serial_transitions_total",
            "Serialized unit state transitions"
        ),
        &["to_state"]
    )
    .expect("metric can be created");
    pub static ref PURCHASE_ORDERS_GENERATED: IntCounter = IntCounter::new(
        "fulfillment_purchase_orders_generated_total",
        "Purchase orders created from order shortfalls"
    )
    .expect("metric can be created");
    pub static ref DB_MAX_CONNECTIONS: IntGauge = IntGauge::new(
        "fulfillment_db_max_connections",
        "Configured size of the database pool"
    )
    .expect("metric can be created");
    pub static ref DB_CONNECTION_FAILURES: IntCounter = IntCounter::new(
        "fulfillment_db_connection_failures_total",
        "Failed connection attempts and pings"
    )
    .expect("metric can be created");
    pub static ref DB_PING_LATENCY_MS: IntGauge = IntGauge::new(
        "fulfillment_db_ping_latency_ms",
        "Latency of the last successful health ping"
    )
    .expect("metric can be created");
}

/// Registers every collector once; repeated calls are ignored.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ORDERS_CONFIRMED.clone()),
        Box::new(ORDERS_CANCELLED.clone()),
        Box::new(SALES_CREATED.clone()),
        Box::new(STOCK_REJECTIONS.clone()),
        Box::new(PURCHASES_CANCELLED.clone()),
        Box::new(RECONCILIATION_MOVEMENTS.clone()),
        Box::new(SERIAL_TRANSITIONS.clone()),
        Box::new(PURCHASE_ORDERS_GENERATED.clone()),
        Box::new(DB_MAX_CONNECTIONS.clone()),
        Box::new(DB_CONNECTION_FAILURES.clone()),
        Box::new(DB_PING_LATENCY_MS.clone()),
    ];
    for collector in collectors {
        let _ = REGISTRY.register(collector);
    }
}

/// Prometheus text exposition of the fulfillment registry.
pub fn render() -> Result<String, ServiceError> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| ServiceError::InternalError(format!("metrics encoding failed: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| ServiceError::InternalError(format!("metrics encoding failed: {}", e)))
}

/// HTTP endpoint handler for metrics
pub async fn metrics_handler() -> Result<String, ServiceError> {
    render()
}
