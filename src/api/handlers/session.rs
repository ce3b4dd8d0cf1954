//! Session handlers: sign-in and sign-out.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::SessionResponse;
use crate::api::session::{Session, bearer_token};
use crate::app_state::AppState;
use crate::domain::AccountId;
use crate::error::{ErrorResponse, SaviumError};

/// `POST /sessions` — Sign in with an identity-provider ID token.
///
/// The ID token travels as `Authorization: Bearer <id token>` and is checked
/// with the provider before anything is written. Creates the account on
/// first sign-in.
///
/// # Errors
///
/// Returns [`SaviumError::AuthRequired`] for a missing or rejected ID token,
/// [`SaviumError::IdentityUnavailable`] when the provider cannot be asked, or
/// a store error.
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "Sessions",
    summary = "Sign in",
    description = "Verifies the identity provider's ID token sent as the bearer credential and exchanges it for a session token. The account is provisioned with an empty portfolio on first sign-in.",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Missing or rejected ID token", body = ErrorResponse),
        (status = 502, description = "Identity provider unavailable", body = ErrorResponse),
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, SaviumError> {
    let id_token = bearer_token(&headers).ok_or(SaviumError::AuthRequired)?;
    let identity = state.identity.verify(id_token).await?;

    let account_id = AccountId::new(identity.user_id);
    let account = state
        .accounts
        .ensure_account(&account_id, &identity.name, &identity.email)
        .await?;
    let token = state
        .sessions
        .sign_in(account_id.clone(), id_token.to_string())
        .await;
    tracing::info!(%account_id, "signed in");

    Ok((StatusCode::CREATED, Json(SessionResponse { token, account })))
}

/// `DELETE /sessions` — Sign out the current session.
///
/// # Errors
///
/// Returns [`SaviumError::AuthRequired`] without a live session.
#[utoipa::path(
    delete,
    path = "/api/v1/sessions",
    tag = "Sessions",
    summary = "Sign out",
    description = "Revokes the bearer token of the request.",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    )
)]
pub async fn sign_out(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, SaviumError> {
    state.sessions.sign_out(&session.token).await;
    tracing::info!(account_id = %session.account_id, "signed out");
    Ok(StatusCode::NO_CONTENT)
}

/// Session routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/sessions", post(sign_in).delete(sign_out))
}
