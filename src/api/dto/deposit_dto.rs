//! Deposit DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::AmountInput;
use crate::domain::TransactionRecord;
use crate::service::{Currency, DepositReceipt, PaymentOutcome};

const fn default_currency() -> Currency {
    Currency::Inr
}

/// Request body for `POST /deposits/intent`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositIntentBody {
    /// Amount in major units.
    pub amount: AmountInput,
    /// Deposit currency; INR when omitted.
    #[serde(default = "default_currency")]
    pub currency: Currency,
    /// Statement description; generated when omitted.
    #[serde(default)]
    pub description: Option<String>,
}

/// Request body for `POST /deposits/confirm`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmDepositBody {
    /// Amount in major units, as charged; must equal the intent's amount.
    pub amount: AmountInput,
    /// Deposit currency; INR when omitted. Must equal the intent's.
    #[serde(default = "default_currency")]
    pub currency: Currency,
    /// Result reported by the payment widget.
    pub outcome: PaymentOutcome,
}

/// Response body for `POST /deposits/confirm` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct DepositResponse {
    /// The recorded deposit.
    pub record: TransactionRecord,
    /// Balance after the deposit.
    pub new_balance: f64,
}

impl From<DepositReceipt> for DepositResponse {
    fn from(receipt: DepositReceipt) -> Self {
        Self {
            record: receipt.record,
            new_balance: receipt.new_balance,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn confirm_body_parses_widget_outcome() {
        let raw = r#"{
            "amount": 500,
            "outcome": {"status": "succeeded", "payment_intent_id": "pi_123"}
        }"#;
        let Ok(body) = serde_json::from_str::<ConfirmDepositBody>(raw) else {
            panic!("confirm body rejected");
        };
        assert_eq!(body.currency, Currency::Inr);
        assert_eq!(
            body.outcome,
            PaymentOutcome::Succeeded {
                payment_intent_id: "pi_123".to_string()
            }
        );
    }
}
