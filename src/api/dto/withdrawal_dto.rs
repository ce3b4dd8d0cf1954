//! Withdrawal DTOs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::AmountInput;
use crate::domain::{
    EmergencyType, PaymentMethod, PendingDocument, TransactionRecord, WithdrawalFrequency,
};
use crate::error::SaviumError;
use crate::service::{EligibilityReport, WithdrawalMode, WithdrawalReceipt};

/// A supporting document uploaded with an emergency request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DocumentUpload {
    /// File name.
    pub name: String,
    /// Declared MIME type; may be empty.
    #[serde(default, rename = "type")]
    pub mime_type: String,
    /// File bytes, base64. A leading `data:<mime>;base64,` prefix is accepted.
    pub content_base64: String,
}

impl DocumentUpload {
    /// Decodes the upload into a pending document.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::InvalidRequest`] when the content is not base64.
    pub fn decode(self) -> Result<PendingDocument, SaviumError> {
        let encoded = match self.content_base64.split_once(";base64,") {
            Some((prefix, body)) if prefix.starts_with("data:") => body,
            _ => self.content_base64.as_str(),
        };
        let content = STANDARD.decode(encoded.trim()).map_err(|e| {
            SaviumError::InvalidRequest(format!("document {} is not valid base64: {e}", self.name))
        })?;
        Ok(PendingDocument::new(self.name, self.mime_type, content))
    }
}

/// Request body for `POST /withdrawals`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawalRequest {
    /// Standard or emergency.
    #[serde(default)]
    pub mode: WithdrawalMode,
    /// Amount to withdraw.
    pub amount: AmountInput,
    /// Payout rail; bank transfer when omitted.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    /// Emergency category.
    #[serde(default)]
    pub emergency_type: Option<EmergencyType>,
    /// Emergency justification.
    #[serde(default)]
    pub description: Option<String>,
    /// Supporting documents, in attachment order.
    #[serde(default)]
    pub documents: Vec<DocumentUpload>,
}

/// Response body for `POST /withdrawals` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawalResponse {
    /// The committed record.
    pub record: TransactionRecord,
    /// Balance after the withdrawal.
    pub new_balance: f64,
    /// Promised processing time in days.
    pub processing_days: u32,
    /// Confirmation text for the user.
    pub message: String,
}

impl From<WithdrawalReceipt> for WithdrawalResponse {
    fn from(receipt: WithdrawalReceipt) -> Self {
        let message = if receipt.record.emergency.is_some() {
            "Emergency withdrawal request submitted for review".to_string()
        } else {
            format!(
                "Withdrawal request submitted successfully. Funds arrive within {} business day(s).",
                receipt.processing_days
            )
        };
        Self {
            record: receipt.record,
            new_balance: receipt.new_balance,
            processing_days: receipt.processing_days,
            message,
        }
    }
}

/// Response body for `GET /withdrawals/eligibility`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EligibilityResponse {
    /// Whether a standard withdrawal is currently permitted.
    pub eligible: bool,
    /// Why not, when ineligible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Promised processing time in days.
    pub processing_days: u32,
    /// How recently the account withdrew.
    pub frequency: WithdrawalFrequency,
}

impl From<EligibilityReport> for EligibilityResponse {
    fn from(report: EligibilityReport) -> Self {
        Self {
            eligible: report.result.eligible,
            reason: report.result.reason,
            processing_days: report.result.processing_days,
            frequency: report.frequency,
        }
    }
}
