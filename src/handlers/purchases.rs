use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use super::{created, retrying, Created};
use crate::{
    handlers::AppState,
    services::{
        collaborators::Actor,
        purchases::{PurchaseCancellation, PurchaseDetail, ReceivePurchaseRequest},
    },
    ApiResponse, ApiResult,
};

pub fn purchases_routes() -> Router<AppState> {
    Router::new()
        .route("/purchases", post(receive_purchase))
        .route("/purchases/:id", get(get_purchase))
        .route("/purchases/:id/cancel", post(cancel_purchase))
}

/// Record goods received from a supplier
async fn receive_purchase(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<ReceivePurchaseRequest>,
) -> Created<PurchaseDetail> {
    let purchase = retrying(&state, || {
        state.services.purchases.receive(request.clone(), actor)
    })
    .await?;
    info!(purchase_id = %purchase.purchase.id, "purchase received");
    created(purchase)
}

async fn get_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseDetail> {
    let purchase = state.services.purchases.get(id).await?;
    Ok(Json(ApiResponse::success(purchase)))
}

/// Reverse a processed purchase
async fn cancel_purchase(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseCancellation> {
    let cancellation = retrying(&state, || state.services.purchases.cancel(id, actor)).await?;
    Ok(Json(ApiResponse::success(cancellation)))
}
