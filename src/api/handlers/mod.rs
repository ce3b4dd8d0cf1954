//! REST endpoint handlers organized by resource.

pub mod account;
pub mod deposit;
pub mod projection;
pub mod session;
pub mod system;
pub mod transaction;
pub mod withdrawal;

use axum::Router;

use crate::app_state::AppState;
use crate::config::SaviumConfig;

/// Composes all resource routes under `/api/v1`.
pub fn routes(config: &SaviumConfig) -> Router<AppState> {
    Router::new()
        .merge(session::routes())
        .merge(account::routes())
        .merge(withdrawal::routes(config.withdrawal_max_documents))
        .merge(transaction::routes())
        .merge(deposit::routes())
        .merge(projection::routes())
}
