//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::error::SaviumError;

/// Query parameters of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Session token issued by `POST /api/v1/sessions`.
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /ws?token=` — Upgrade an authenticated HTTP connection to WebSocket.
///
/// The socket is closed when the session is signed out.
///
/// # Errors
///
/// Returns [`SaviumError::AuthRequired`] when the token is missing or unknown.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> Result<impl IntoResponse, SaviumError> {
    let token = params.token.ok_or(SaviumError::AuthRequired)?;
    let account_id = state.sessions.resolve(&token).await?.account_id;
    let revocation = state.sessions.watch(&token).await?;
    let events = state.event_bus.subscribe_account(account_id.clone());
    let accounts = state.accounts.clone();

    tracing::debug!(%account_id, "ws upgrade");
    Ok(ws.on_upgrade(move |socket| {
        run_connection(socket, account_id, revocation, events, accounts)
    }))
}
