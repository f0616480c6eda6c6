use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use super::{created, retrying, Created};
use crate::{
    entities::quote,
    handlers::AppState,
    services::{
        collaborators::Actor,
        orders::PlacedOrder,
        quotes::{ConvertQuoteToSaleRequest, CreateQuoteRequest, QuoteDetail},
        sales::SaleDetail,
    },
    ApiResponse, ApiResult,
};

/// Creates the router for quote endpoints
pub fn quotes_routes() -> Router<AppState> {
    Router::new()
        .route("/quotes", post(create_quote))
        .route("/quotes/:id", get(get_quote))
        .route("/quotes/:id/approve", post(approve_quote))
        .route("/quotes/:id/convert-to-order", post(convert_to_order))
        .route("/quotes/:id/convert-to-sale", post(convert_to_sale))
}

async fn create_quote(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateQuoteRequest>,
) -> Created<QuoteDetail> {
    let quote = state.services.quotes.create(request, actor).await?;
    info!(quote_id = %quote.quote.id, "quote created");
    created(quote)
}

async fn get_quote(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<QuoteDetail> {
    let quote = state.services.quotes.get(id).await?;
    Ok(Json(ApiResponse::success(quote)))
}

async fn approve_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<quote::Model> {
    let quote = state.services.quotes.approve(id).await?;
    Ok(Json(ApiResponse::success(quote)))
}

/// Turn the quote into a pending order; shortfalls raise purchase orders
async fn convert_to_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Created<PlacedOrder> {
    let placed = retrying(&state, || state.services.quotes.convert_to_order(id, actor)).await?;
    created(placed)
}

/// Sell straight from the quote
async fn convert_to_sale(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<ConvertQuoteToSaleRequest>,
) -> Created<SaleDetail> {
    let sale = retrying(&state, || {
        state.services.quotes.convert_to_sale(id, &request, actor)
    })
    .await?;
    created(sale)
}
