//! Transaction history DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::TransactionRecord;
use crate::service::TransactionFilter;

/// Query parameters of `GET /transactions`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionQuery {
    /// Page size; the configured default when omitted.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Record kinds to include.
    #[serde(default)]
    #[param(inline)]
    pub filter: TransactionFilter,
}

/// Response body of `GET /transactions`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    /// Records, newest first.
    pub transactions: Vec<TransactionRecord>,
    /// Number of records returned.
    pub count: usize,
}

impl FromIterator<TransactionRecord> for TransactionListResponse {
    fn from_iter<I: IntoIterator<Item = TransactionRecord>>(iter: I) -> Self {
        let transactions: Vec<_> = iter.into_iter().collect();
        Self {
            count: transactions.len(),
            transactions,
        }
    }
}
