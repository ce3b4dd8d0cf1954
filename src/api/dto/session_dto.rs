//! Sign-in DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::Account;

/// Response body for `POST /sessions` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// The signed-in account.
    pub account: Account,
}
