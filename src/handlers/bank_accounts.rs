use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::{created, Created};
use crate::{
    entities::bank_account,
    handlers::AppState,
    services::finance::{BankAccountDetail, CreateBankAccountRequest},
    ApiResponse, ApiResult,
};

pub fn bank_accounts_routes() -> Router<AppState> {
    Router::new()
        .route("/bank-accounts", post(create_bank_account))
        .route("/bank-accounts/:id", get(get_bank_account))
}

async fn create_bank_account(
    State(state): State<AppState>,
    Json(request): Json<CreateBankAccountRequest>,
) -> Created<bank_account::Model> {
    let account = state.services.bank_accounts.create(request).await?;
    created(account)
}

/// Account with its movements
async fn get_bank_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<BankAccountDetail> {
    let account = state.services.bank_accounts.get(id).await?;
    Ok(Json(ApiResponse::success(account)))
}
