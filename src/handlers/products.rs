use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::{created, Created};
use crate::{
    handlers::AppState,
    services::catalog::{CreateProductRequest, ProductDetail},
    ApiResponse, ApiResult,
};

/// Creates the router for product endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", get(get_product))
}

/// Create a product, with its components when it is a kit
async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Created<ProductDetail> {
    let product = state.services.catalog.create(request).await?;
    created(product)
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductDetail> {
    let product = state.services.catalog.get(id).await?;
    Ok(Json(ApiResponse::success(product)))
}
