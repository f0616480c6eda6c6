use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use super::{created, retrying, Created};
use crate::{
    entities::order,
    errors::ServiceError,
    handlers::AppState,
    services::{
        collaborators::Actor,
        orders::{
            ConvertOrderToSaleRequest, CreateOrderRequest, OrderDetail, PlacedOrder,
            SaleConversion,
        },
    },
    ApiResponse, ApiResult,
};

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/confirm", post(confirm_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/start-preparation", post(start_preparation))
        .route("/orders/:id/mark-ready", post(mark_ready))
        .route("/orders/:id/convert-to-sale", post(convert_to_sale))
}

/// Create an order; lines that cannot be filled raise purchase orders
async fn create_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateOrderRequest>,
) -> Created<PlacedOrder> {
    let placed = retrying(&state, || {
        state.services.orders.create(request.clone(), actor)
    })
    .await?;
    info!(
        order_id = %placed.order.id,
        generated = placed.generated_purchase_orders.len(),
        "order created"
    );
    created(placed)
}

async fn get_order(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<OrderDetail> {
    let order = state.services.orders.get(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Reserve stock for every line
async fn confirm_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = retrying(&state, || state.services.orders.confirm(id, actor)).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Cancel and release whatever the order holds
async fn cancel_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = retrying(&state, || state.services.orders.cancel(id, actor)).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn start_preparation(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = state.services.orders.start_preparation(id, actor).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn mark_ready(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = state.services.orders.mark_ready(id, actor).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Record the sale. A forced re-send of an order already sent answers 200
/// with the existing sale.
async fn convert_to_sale(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<ConvertOrderToSaleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SaleConversion>>), ServiceError> {
    let conversion = retrying(&state, || {
        state.services.orders.convert_to_sale(id, &request, actor)
    })
    .await?;

    if conversion.created {
        Ok((StatusCode::CREATED, Json(ApiResponse::success(conversion))))
    } else {
        Ok((
            StatusCode::OK,
            Json(ApiResponse::with_message(
                conversion,
                "order was already sent to sale",
            )),
        ))
    }
}
