//! Ledger error types with HTTP status code mapping.
//!
//! [`SaviumError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! [`ValidationError`] covers the user-correctable form failures that are
//! shown inline and never touch the store.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::AccountId;

/// Message shown to the end user when a submission fails for a reason they
/// cannot correct themselves.
pub const GENERIC_RETRY_MESSAGE: &str = "Failed to process withdrawal. Please try again.";

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "insufficient funds: requested 100.01, available 100",
///     "details": "Insufficient funds for withdrawal"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`SaviumError`]).
    pub code: u32,
    /// Diagnostic error message.
    pub message: String,
    /// Message suitable for display to the end user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// User-correctable validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The amount is missing, unparsable, or not positive.
    #[error("Please enter a valid amount")]
    InvalidAmount,

    /// Emergency mode was chosen without selecting an emergency type.
    #[error("Please select an emergency type")]
    MissingEmergencyType,

    /// The emergency description is shorter than the required minimum.
    #[error("Please provide more details about your emergency (minimum {minimum} characters, got {length})")]
    DescriptionTooShort {
        /// Length of the submitted description in characters.
        length: usize,
        /// Minimum accepted length.
        minimum: usize,
    },

    /// Emergency mode was chosen without attaching a supporting document.
    #[error("Please upload at least one supporting document")]
    NoDocuments,

    /// More documents are attached than one request may carry.
    #[error("Please attach at most {maximum} documents (got {count})")]
    TooManyDocuments {
        /// Number of attached documents.
        count: usize,
        /// Accepted maximum.
        maximum: usize,
    },

    /// A deposit amount is below the currency's minimum.
    #[error("Minimum deposit amount is {minimum} {currency}")]
    AmountBelowMinimum {
        /// Minimum amount in major units.
        minimum: f64,
        /// Currency code.
        currency: String,
    },

    /// The dialog is not open.
    #[error("withdrawal dialog is not open")]
    DialogClosed,

    /// A submission is already running; the dialog cannot change or close.
    #[error("a withdrawal submission is already in progress")]
    SubmissionInProgress,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                  |
/// |-----------|-----------------------|------------------------------|
/// | 1000–1999 | Validation / Auth     | 400 / 401 / 413              |
/// | 2000–2999 | State / Not Found     | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server / Upstream     | 500 / 502                    |
/// | 4000–4999 | Withdrawal / Payment  | 402 / 422                    |
#[derive(Debug, thiserror::Error)]
pub enum SaviumError {
    /// A form field failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Request payload could not be interpreted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An attached file exceeds the document size limit.
    #[error("file {name} is {size} bytes and exceeds the 1MB limit")]
    FileTooLarge {
        /// Name of the offending file.
        name: String,
        /// Size of the offending file in bytes.
        size: usize,
    },

    /// The request body exceeds the route's size limit.
    #[error("request body exceeds {limit} bytes")]
    RequestTooLarge {
        /// Body limit of the route, in bytes.
        limit: usize,
    },

    /// The requested amount exceeds the withdrawable balance.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Requested amount.
        requested: f64,
        /// Balance the request was validated against.
        available: f64,
    },

    /// The eligibility policy rejected a standard withdrawal.
    #[error("withdrawal not permitted: {0}")]
    IneligibleWithdrawal(String),

    /// The payment widget reported a failed payment.
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    /// No authenticated session could be resolved.
    #[error("authentication required")]
    AuthRequired,

    /// Account with the given id does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// A document addressed by collection and id does not exist.
    #[error("document not found: {collection}/{id}")]
    DocumentNotFound {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
    },

    /// A conditional write lost against a concurrent update.
    #[error("conflicting update: {0}")]
    Conflict(String),

    /// Reading from the document store failed.
    #[error("store read failed: {0}")]
    StoreRead(String),

    /// Writing to the document store failed.
    #[error("store write failed: {0}")]
    StoreWrite(String),

    /// The deposit-intent backend rejected or failed the request.
    #[error("deposit intent failed ({status}): {message}")]
    DepositIntentFailed {
        /// HTTP status returned by the backend (0 when unreachable).
        status: u16,
        /// Backend error message.
        message: String,
    },

    /// The identity provider could not be reached or answered garbage.
    #[error("identity provider unavailable: {0}")]
    IdentityUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SaviumError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::InvalidRequest(_) => 1002,
            Self::FileTooLarge { .. } => 1003,
            Self::RequestTooLarge { .. } => 1004,
            Self::AuthRequired => 1401,
            Self::AccountNotFound(_) => 2001,
            Self::DocumentNotFound { .. } => 2002,
            Self::Conflict(_) => 2009,
            Self::Internal(_) => 3000,
            Self::StoreRead(_) => 3001,
            Self::StoreWrite(_) => 3002,
            Self::DepositIntentFailed { .. } => 3003,
            Self::IdentityUnavailable(_) => 3004,
            Self::InsufficientFunds { .. } => 4001,
            Self::IneligibleWithdrawal(_) => 4002,
            Self::PaymentFailed(_) => 4003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::FileTooLarge { .. } | Self::RequestTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::AuthRequired => StatusCode::UNAUTHORIZED,
            Self::AccountNotFound(_) | Self::DocumentNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InsufficientFunds { .. } | Self::IneligibleWithdrawal(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
            Self::DepositIntentFailed { .. } | Self::IdentityUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::StoreRead(_) | Self::StoreWrite(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns `true` if the same request may succeed when retried unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict(_)
                | Self::StoreRead(_)
                | Self::StoreWrite(_)
                | Self::DepositIntentFailed { .. }
                | Self::IdentityUnavailable(_)
                | Self::Internal(_)
        )
    }

    /// Returns the message to show the end user.
    ///
    /// Store and internal failures collapse to a generic retry message;
    /// user-correctable failures carry their own text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(v) => v.to_string(),
            Self::FileTooLarge { name, .. } => format!(
                "File {name} exceeds the 1MB limit. Please compress or resize your files."
            ),
            Self::RequestTooLarge { .. } => {
                "Your files are too large to send together. Please attach fewer or smaller files."
                    .to_string()
            }
            Self::InsufficientFunds { .. } => "Insufficient funds for withdrawal".to_string(),
            Self::IneligibleWithdrawal(reason) => reason.clone(),
            Self::PaymentFailed(message) => message.clone(),
            Self::AuthRequired => "Please sign in to continue".to_string(),
            Self::IdentityUnavailable(_) => {
                "Sign-in is temporarily unavailable. Please try again.".to_string()
            }
            Self::InvalidRequest(message) => message.clone(),
            Self::AccountNotFound(_) | Self::DocumentNotFound { .. } => {
                "The requested item could not be found".to_string()
            }
            Self::Conflict(_)
            | Self::StoreRead(_)
            | Self::StoreWrite(_)
            | Self::DepositIntentFailed { .. }
            | Self::Internal(_) => GENERIC_RETRY_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for SaviumError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: Some(self.user_message()),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
