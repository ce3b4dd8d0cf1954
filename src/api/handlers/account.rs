//! Account snapshot handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::session::Session;
use crate::app_state::AppState;
use crate::domain::Account;
use crate::error::{ErrorResponse, SaviumError};

/// `GET /account` — Current account snapshot.
///
/// # Errors
///
/// Returns [`SaviumError::AccountNotFound`] or a store error.
#[utoipa::path(
    get,
    path = "/api/v1/account",
    tag = "Account",
    summary = "Get the signed-in account",
    description = "Returns the full account document, including the financial summary.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Account snapshot", body = Account),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
    )
)]
pub async fn get_account(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, SaviumError> {
    let account = state.accounts.get_account(&session.account_id).await?;
    Ok(Json(account))
}

/// Account routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/account", get(get_account))
}
