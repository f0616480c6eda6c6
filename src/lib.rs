//! StateSet Fulfillment
//!
//! Inventory reservation and order fulfilment: a stock ledger with
//! reservations, serialized units, kit expansion, shortfall purchase orders,
//! document state machines and purchase reversal, served over HTTP.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod migrator;
pub mod services;

use axum::{response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{AppServices, ServiceContext};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
}

impl AppState {
    /// Builds every service over one shared context.
    pub fn new(db: Arc<DbPool>, config: config::AppConfig, event_sender: Arc<EventSender>) -> Self {
        let ctx = ServiceContext::new(db.clone(), event_sender.clone(), config.generic_supplier_id);
        Self::with_context(ctx, config)
    }

    /// Uses a prepared context, e.g. one carrying a fixed clock.
    pub fn with_context(ctx: ServiceContext, config: config::AppConfig) -> Self {
        Self {
            db: ctx.db_pool.clone(),
            event_sender: ctx.event_sender.clone(),
            services: AppServices::new(ctx),
            config,
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: ResponseMeta::capture(),
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Versioned business routes, mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::products::products_routes())
        .merge(handlers::quotes::quotes_routes())
        .merge(handlers::orders::orders_routes())
        .merge(handlers::purchase_orders::purchase_orders_routes())
        .merge(handlers::purchases::purchases_routes())
        .merge(handlers::inventory::inventory_routes())
        .merge(handlers::bank_accounts::bank_accounts_routes())
}

/// Full application router with health, metrics and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api/v1", api_v1_routes())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn success_response_carries_timestamp() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        DateTime::parse_from_rfc3339(&response.meta.timestamp).unwrap();
    }

    #[test]
    fn message_is_omitted_when_absent() {
        let body = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert!(body.get("message").is_none());

        let body = serde_json::to_value(ApiResponse::with_message(1, "already sent")).unwrap();
        assert_eq!(body["message"], "already sent");
    }
}
