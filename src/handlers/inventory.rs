use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::{created, retrying, Created};
use crate::{
    entities::{serialized_unit, stock_movement},
    handlers::AppState,
    services::{
        collaborators::Actor,
        inventory::{AdjustInventoryRequest, AdjustmentResult},
        stock_ledger::StockLevel,
    },
    ApiResponse, ApiResult,
};

/// Creates the router for inventory endpoints
pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/inventory/adjustments", post(adjust_inventory))
        .route(
            "/inventory/:product_id/warehouses/:warehouse_id",
            get(get_stock_level),
        )
        .route(
            "/inventory/:product_id/warehouses/:warehouse_id/movements",
            get(list_movements),
        )
        .route("/inventory/:product_id/serials", get(list_serial_units))
}

/// Manual stock correction
async fn adjust_inventory(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<AdjustInventoryRequest>,
) -> Created<AdjustmentResult> {
    let result = retrying(&state, || {
        state.services.inventory.adjust(request.clone(), actor)
    })
    .await?;
    created(result)
}

async fn get_stock_level(
    State(state): State<AppState>,
    Path((product_id, warehouse_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StockLevel> {
    let level = state
        .services
        .inventory
        .stock_level(product_id, warehouse_id)
        .await?;
    Ok(Json(ApiResponse::success(level)))
}

/// Ledger history, oldest first
async fn list_movements(
    State(state): State<AppState>,
    Path((product_id, warehouse_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Vec<stock_movement::Model>> {
    let movements = state
        .services
        .inventory
        .movements(product_id, warehouse_id)
        .await?;
    Ok(Json(ApiResponse::success(movements)))
}

async fn list_serial_units(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Vec<serialized_unit::Model>> {
    let units = state.services.inventory.serial_units(product_id).await?;
    Ok(Json(ApiResponse::success(units)))
}
