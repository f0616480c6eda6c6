use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    entities::purchase_order,
    handlers::AppState,
    services::procurement::PurchaseOrderDetail,
    ApiResponse, ApiResult,
};

pub fn purchase_orders_routes() -> Router<AppState> {
    Router::new()
        .route("/purchase-orders/:id", get(get_purchase_order))
        .route("/purchase-orders/:id/send", post(mark_sent))
        .route("/purchase-orders/:id/cancel", post(cancel_purchase_order))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelPurchaseOrderRequest {
    pub reason: Option<String>,
}

async fn get_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseOrderDetail> {
    let po = state.services.purchase_orders.get(id).await?;
    Ok(Json(ApiResponse::success(po)))
}

async fn mark_sent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<purchase_order::Model> {
    let po = state.services.purchase_orders.mark_sent(id).await?;
    Ok(Json(ApiResponse::success(po)))
}

async fn cancel_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelPurchaseOrderRequest>,
) -> ApiResult<purchase_order::Model> {
    let po = state
        .services
        .purchase_orders
        .cancel(id, request.reason)
        .await?;
    Ok(Json(ApiResponse::success(po)))
}
