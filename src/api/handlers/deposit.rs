//! Deposit handlers: payment intent creation and payment confirmation.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{ConfirmDepositBody, DepositIntentBody, DepositResponse};
use crate::api::session::Session;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, SaviumError, ValidationError};
use crate::service::DepositIntent;

/// `POST /deposits/intent` — Create a payment intent.
///
/// # Errors
///
/// Returns a validation error below the currency minimum, or
/// [`SaviumError::DepositIntentFailed`] when the backend refuses.
#[utoipa::path(
    post,
    path = "/api/v1/deposits/intent",
    tag = "Deposits",
    summary = "Create a deposit intent",
    description = "Checks the currency minimum (INR 100, USD 1.00), asks the payment backend for a client secret on behalf of the signed-in identity and records the intent as issued to this account.",
    security(("bearer" = [])),
    request_body = DepositIntentBody,
    responses(
        (status = 200, description = "Intent created", body = DepositIntent),
        (status = 400, description = "Below minimum", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 502, description = "Payment backend error", body = ErrorResponse),
    )
)]
pub async fn create_intent(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<DepositIntentBody>,
) -> Result<impl IntoResponse, SaviumError> {
    let amount = body.amount.value().ok_or(ValidationError::InvalidAmount)?;
    let intent = state
        .deposits
        .create_intent(
            &session.account_id,
            &session.id_token,
            amount,
            body.currency,
            body.description,
        )
        .await?;
    Ok(Json(intent))
}

/// `POST /deposits/confirm` — Record the payment widget's outcome.
///
/// # Errors
///
/// Returns [`SaviumError::PaymentFailed`] for a failed payment,
/// [`SaviumError::DocumentNotFound`] for an intent never issued to the
/// caller, [`SaviumError::InvalidRequest`] when the payment differs from its
/// intent, [`SaviumError::Conflict`] or a store error.
#[utoipa::path(
    post,
    path = "/api/v1/deposits/confirm",
    tag = "Deposits",
    summary = "Confirm a deposit",
    description = "On a successful payment for an intent issued to the caller, with the intent's amount and currency, records a completed deposit, credits the portfolio and marks the intent recorded atomically. Each intent is credited at most once. A failed payment writes nothing.",
    security(("bearer" = [])),
    request_body = ConfirmDepositBody,
    responses(
        (status = 201, description = "Deposit recorded", body = DepositResponse),
        (status = 400, description = "Payment does not match its intent", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 402, description = "Payment failed", body = ErrorResponse),
        (status = 404, description = "Intent not issued to this account", body = ErrorResponse),
        (status = 409, description = "Already recorded or balance changed concurrently", body = ErrorResponse),
    )
)]
pub async fn confirm_deposit(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ConfirmDepositBody>,
) -> Result<impl IntoResponse, SaviumError> {
    let amount = body.amount.value().ok_or(ValidationError::InvalidAmount)?;
    let receipt = state
        .deposits
        .record_payment(&session.account_id, amount, body.currency, body.outcome)
        .await?;
    Ok((StatusCode::CREATED, Json(DepositResponse::from(receipt))))
}

/// Deposit routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/deposits/intent", post(create_intent))
        .route("/deposits/confirm", post(confirm_deposit))
}
