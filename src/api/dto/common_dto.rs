//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A monetary amount as typed by the user: a JSON number or a string.
///
/// Strings are kept verbatim so validation can report non-numeric input the
/// same way the form does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum AmountInput {
    /// Numeric amount.
    Number(f64),
    /// Raw text amount, e.g. `"500"`.
    Text(String),
}

impl AmountInput {
    /// The amount as form text.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Number(value) => value.to_string(),
            Self::Text(text) => text,
        }
    }

    /// Parses the amount, returning `None` for non-numeric text.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Simple acknowledgement body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable outcome.
    pub message: String,
}
