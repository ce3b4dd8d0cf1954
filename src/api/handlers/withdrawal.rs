//! Withdrawal handlers: eligibility check and request submission.

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{EligibilityResponse, WithdrawalRequest, WithdrawalResponse};
use crate::api::session::Session;
use crate::app_state::AppState;
use crate::domain::document::MAX_DOCUMENT_BYTES;
use crate::error::{ErrorResponse, SaviumError};
use crate::service::{WithdrawalDialog, WithdrawalMode};

/// Data-URL prefix, name and type of one upload.
const UPLOAD_ENVELOPE_BYTES: usize = 1024;

/// Non-document fields of a request.
const FORM_ENVELOPE_BYTES: usize = 64 * 1024;

/// Body limit of `POST /withdrawals` for up to `max_documents` base64
/// uploads of at most [`MAX_DOCUMENT_BYTES`] each.
#[must_use]
pub fn body_limit(max_documents: usize) -> usize {
    let encoded = MAX_DOCUMENT_BYTES.div_ceil(3) * 4 + UPLOAD_ENVELOPE_BYTES;
    encoded
        .saturating_mul(max_documents.max(1))
        .saturating_add(FORM_ENVELOPE_BYTES)
}

/// `GET /withdrawals/eligibility` — Standard-withdrawal eligibility.
///
/// # Errors
///
/// Returns [`SaviumError::AccountNotFound`] or a store error.
#[utoipa::path(
    get,
    path = "/api/v1/withdrawals/eligibility",
    tag = "Withdrawals",
    summary = "Check withdrawal eligibility",
    description = "Evaluates the account-age and cooldown rules now. Emergency withdrawals are not subject to them.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Eligibility", body = EligibilityResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
    )
)]
pub async fn get_eligibility(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, SaviumError> {
    let report = state.withdrawals.eligibility(&session.account_id).await?;
    Ok(Json(EligibilityResponse::from(report)))
}

/// `POST /withdrawals` — Submit a standard or emergency withdrawal.
///
/// Opens a dialog server-side, fills it from the request and submits it, so
/// validation and eligibility cannot be bypassed by the client.
///
/// # Errors
///
/// Returns [`SaviumError::RequestTooLarge`] past the body limit,
/// [`SaviumError::InvalidRequest`] for an unreadable body, the first
/// validation failure, [`SaviumError::InsufficientFunds`],
/// [`SaviumError::IneligibleWithdrawal`], [`SaviumError::FileTooLarge`],
/// [`SaviumError::Conflict`] or a store error.
#[utoipa::path(
    post,
    path = "/api/v1/withdrawals",
    tag = "Withdrawals",
    summary = "Request a withdrawal",
    description = "Standard requests are gated by the eligibility policy. Emergency requests bypass it but need a category, a description of at least 20 characters and one to WITHDRAWAL_MAX_DOCUMENTS (default 5) supporting documents of at most 1 MB each.",
    security(("bearer" = [])),
    request_body = WithdrawalRequest,
    responses(
        (status = 201, description = "Request committed", body = WithdrawalResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 409, description = "Balance changed concurrently", body = ErrorResponse),
        (status = 413, description = "Document or request body too large", body = ErrorResponse),
        (status = 422, description = "Insufficient funds or ineligible", body = ErrorResponse),
    )
)]
pub async fn create_withdrawal(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<WithdrawalRequest>, JsonRejection>,
) -> Result<impl IntoResponse, SaviumError> {
    let Json(req) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            SaviumError::RequestTooLarge {
                limit: body_limit(state.config.withdrawal_max_documents),
            }
        } else {
            SaviumError::InvalidRequest(rejection.body_text())
        }
    })?;

    let mut dialog = state.withdrawals.open(&session.account_id).await?;
    fill_dialog(&mut dialog, req)?;

    let receipt = state.withdrawals.submit(&mut dialog).await?;
    Ok((StatusCode::CREATED, Json(WithdrawalResponse::from(receipt))))
}

/// Copies the request into an open dialog.
///
/// # Errors
///
/// Returns [`SaviumError::InvalidRequest`] for undecodable documents.
fn fill_dialog(dialog: &mut WithdrawalDialog, req: WithdrawalRequest) -> Result<(), SaviumError> {
    dialog.set_mode(req.mode)?;
    dialog.set_amount(req.amount.into_text())?;
    if let Some(method) = req.payment_method {
        dialog.set_payment_method(method)?;
    }

    if req.mode == WithdrawalMode::Emergency {
        if let Some(emergency_type) = req.emergency_type {
            dialog.set_emergency_type(emergency_type)?;
        }
        if let Some(description) = req.description {
            dialog.set_description(description)?;
        }
        for upload in req.documents {
            dialog.attach(upload.decode()?)?;
        }
    }
    Ok(())
}

/// Withdrawal routes. Request bodies are sized for `max_documents`
/// uploads.
pub fn routes(max_documents: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/withdrawals",
            post(create_withdrawal).layer(DefaultBodyLimit::max(body_limit(max_documents))),
        )
        .route("/withdrawals/eligibility", get(get_eligibility))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_fits_every_document_at_full_size() {
        let base64_of_full_document = MAX_DOCUMENT_BYTES * 4 / 3;
        assert!(body_limit(2) > 2 * base64_of_full_document);
        assert!(body_limit(5) > 5 * base64_of_full_document);
        assert!(body_limit(5) < 6 * base64_of_full_document);
    }

    #[test]
    fn zero_documents_still_allows_one() {
        assert_eq!(body_limit(0), body_limit(1));
    }
}
