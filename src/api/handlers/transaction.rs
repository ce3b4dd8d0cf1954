//! Transaction history handler.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{TransactionListResponse, TransactionQuery};
use crate::api::session::Session;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, SaviumError};

/// `GET /transactions` — Merged ledger history, newest first.
///
/// # Errors
///
/// Returns a store error.
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    tag = "Transactions",
    summary = "List transactions",
    description = "Merges deposits, withdrawals and emergency withdrawals of the account, ordered by creation time descending and truncated to `limit`.",
    security(("bearer" = [])),
    params(TransactionQuery),
    responses(
        (status = 200, description = "Transaction page", body = TransactionListResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<TransactionQuery>,
) -> Result<impl IntoResponse, SaviumError> {
    let limit = query
        .limit
        .unwrap_or(state.config.transactions_default_limit);
    let history = state
        .transactions
        .list_filtered(&session.account_id, limit, query.filter)
        .await?;
    Ok(Json(history.collect::<TransactionListResponse>()))
}

/// Transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/transactions", get(list_transactions))
}
