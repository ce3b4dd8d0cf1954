//! Ledger records: deposits, withdrawals and emergency withdrawals.
//!
//! All three kinds share one shape, [`TransactionRecord`]. Each kind lives in
//! its own collection; the merged history is rebuilt by
//! [`crate::service::TransactionLog`]. Emergency withdrawals additionally get
//! a companion [`EmergencyReview`] for the back-office reviewer.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::document::{AttachedDocument, DocumentMetadata};
use super::timestamp;
use super::{AccountId, RecordId};
use crate::error::ValidationError;

/// Collection holding companion emergency review records.
pub const EMERGENCY_REVIEWS_COLLECTION: &str = "emergencyReviews";

/// Minimum length, in characters, of an emergency description.
pub const MIN_EMERGENCY_DESCRIPTION_CHARS: usize = 20;

/// Hours a reviewer has to act on an emergency request.
pub const EMERGENCY_REVIEW_WINDOW_HOURS: i64 = 24;

/// Kind of ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Funds in.
    Deposit,
    /// Standard funds out.
    Withdrawal,
    /// Expedited-review funds out.
    EmergencyWithdrawal,
}

impl TransactionKind {
    /// All kinds, in the order their collections are queried.
    pub const ALL: [Self; 3] = [Self::Deposit, Self::Withdrawal, Self::EmergencyWithdrawal];

    /// Returns the collection that stores records of this kind.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Deposit => "deposits",
            Self::Withdrawal => "withdrawals",
            Self::EmergencyWithdrawal => "emergencyWithdrawals",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::EmergencyWithdrawal => "emergency_withdrawal",
        };
        f.write_str(s)
    }
}

/// Payment rail used to move funds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Bank transfer.
    #[default]
    Bank,
    /// Unified Payments Interface.
    Upi,
    /// Card collected by the payment widget (deposits only).
    Card,
}

/// Processing status of a record. Only the initial value is written here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Accepted and queued for payout.
    Processing,
    /// Waiting for a back-office reviewer.
    PendingReview,
    /// Settled.
    Completed,
    /// Rejected or failed downstream.
    Failed,
}

/// Category of an emergency withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyType {
    /// Medical emergency; reviewed with high priority.
    Medical,
    /// Education expenses.
    Education,
    /// Family emergency.
    Family,
    /// Housing emergency.
    Housing,
    /// Natural disaster.
    NaturalDisaster,
    /// Anything else.
    Other,
}

/// Review priority of an emergency request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Expedited review.
    High,
    /// Standard review queue.
    Normal,
}

impl EmergencyType {
    /// Medical requests are reviewed first; everything else is normal.
    #[must_use]
    pub const fn priority(self) -> Priority {
        match self {
            Self::Medical => Priority::High,
            _ => Priority::Normal,
        }
    }
}

/// Fields present only on emergency withdrawals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyDetails {
    /// Emergency category.
    pub emergency_type: EmergencyType,
    /// Free-text justification.
    pub description: String,
    /// Supporting documents, in attachment order.
    #[serde(default)]
    pub documents: Vec<AttachedDocument>,
    /// Review priority derived from the category.
    pub priority: Priority,
    /// Time by which a reviewer must act.
    #[serde(with = "timestamp")]
    pub review_deadline: DateTime<Utc>,
}

/// Persisted evidence of a deposit, withdrawal or emergency withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Record id, unique within its collection.
    pub id: RecordId,
    /// Owning account.
    #[serde(rename = "userId")]
    pub account_id: AccountId,
    /// Record kind.
    pub kind: TransactionKind,
    /// Positive amount in major currency units.
    pub amount: f64,
    /// Payment rail, optional for deposits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    /// Initial processing status.
    pub status: TransactionStatus,
    /// Creation time; the sole ordering key across kinds.
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Currency code (deposits).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Payment processor reference (deposits).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    /// Emergency-only fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency: Option<EmergencyDetails>,
}

impl TransactionRecord {
    /// Builds a completed deposit record.
    #[must_use]
    pub fn deposit(
        account_id: AccountId,
        amount: f64,
        currency: &str,
        payment_intent_id: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            account_id,
            kind: TransactionKind::Deposit,
            amount,
            payment_method: Some(PaymentMethod::Card),
            status: TransactionStatus::Completed,
            created_at,
            currency: Some(currency.to_string()),
            payment_intent_id,
            emergency: None,
        }
    }

    /// Builds a standard withdrawal record in `Processing` status.
    #[must_use]
    pub fn withdrawal(
        account_id: AccountId,
        amount: f64,
        payment_method: PaymentMethod,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            account_id,
            kind: TransactionKind::Withdrawal,
            amount,
            payment_method: Some(payment_method),
            status: TransactionStatus::Processing,
            created_at,
            currency: None,
            payment_intent_id: None,
            emergency: None,
        }
    }

    /// Builds an emergency withdrawal record in `PendingReview` status.
    ///
    /// Priority and review deadline are derived from the category and
    /// `created_at`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the amount is not positive, the
    /// description is shorter than [`MIN_EMERGENCY_DESCRIPTION_CHARS`] or no
    /// document is attached.
    pub fn emergency_withdrawal(
        account_id: AccountId,
        amount: f64,
        payment_method: PaymentMethod,
        emergency_type: EmergencyType,
        description: String,
        documents: Vec<AttachedDocument>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(ValidationError::InvalidAmount);
        }
        let length = description.chars().count();
        if length < MIN_EMERGENCY_DESCRIPTION_CHARS {
            return Err(ValidationError::DescriptionTooShort {
                length,
                minimum: MIN_EMERGENCY_DESCRIPTION_CHARS,
            });
        }
        if documents.is_empty() {
            return Err(ValidationError::NoDocuments);
        }
        Ok(Self {
            id: RecordId::new(),
            account_id,
            kind: TransactionKind::EmergencyWithdrawal,
            amount,
            payment_method: Some(payment_method),
            status: TransactionStatus::PendingReview,
            created_at,
            currency: None,
            payment_intent_id: None,
            emergency: Some(EmergencyDetails {
                emergency_type,
                description,
                documents,
                priority: emergency_type.priority(),
                review_deadline: created_at + Duration::hours(EMERGENCY_REVIEW_WINDOW_HOURS),
            }),
        })
    }
}

/// Companion record for the back-office review of an emergency withdrawal.
///
/// Keyed by the same id as the withdrawal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyReview {
    /// Id of the emergency withdrawal record.
    pub withdrawal_id: RecordId,
    /// Requesting account.
    #[serde(rename = "userId")]
    pub account_id: AccountId,
    /// Account holder name for the reviewer.
    pub user_name: String,
    /// Account holder email for the reviewer.
    pub user_email: String,
    /// Requested amount.
    pub amount: f64,
    /// Emergency category.
    pub emergency_type: EmergencyType,
    /// Free-text justification.
    pub description: String,
    /// Encoded supporting documents.
    pub document_data: Vec<AttachedDocument>,
    /// Name, type and size of each document.
    pub document_metadata: Vec<DocumentMetadata>,
    /// Review status.
    pub status: TransactionStatus,
    /// Review priority.
    pub priority: Priority,
    /// Submission time.
    #[serde(with = "timestamp")]
    pub submitted_at: DateTime<Utc>,
    /// Time by which a reviewer must act.
    #[serde(with = "timestamp")]
    pub review_deadline: DateTime<Utc>,
    /// Payout rail.
    pub payment_method: PaymentMethod,
    /// Set by the reviewer once handled.
    pub processed: bool,
    /// Reviewer notes.
    pub review_notes: String,
}

impl EmergencyReview {
    /// Builds the review record for an emergency withdrawal.
    ///
    /// Returns `None` when the record is not an emergency withdrawal.
    #[must_use]
    pub fn for_record(record: &TransactionRecord, user_name: &str, user_email: &str) -> Option<Self> {
        let details = record.emergency.as_ref()?;
        Some(Self {
            withdrawal_id: record.id,
            account_id: record.account_id.clone(),
            user_name: if user_name.is_empty() {
                "User".to_string()
            } else {
                user_name.to_string()
            },
            user_email: user_email.to_string(),
            amount: record.amount,
            emergency_type: details.emergency_type,
            description: details.description.clone(),
            document_data: details.documents.clone(),
            document_metadata: details.documents.iter().map(DocumentMetadata::from).collect(),
            status: TransactionStatus::PendingReview,
            priority: details.priority,
            submitted_at: record.created_at,
            review_deadline: details.review_deadline,
            payment_method: record.payment_method.unwrap_or_default(),
            processed: false,
            review_notes: String::new(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn sample_doc() -> AttachedDocument {
        AttachedDocument {
            encoded_content: "data:image/png;base64,AAAA".to_string(),
            name: "bill.png".to_string(),
            mime_type: "image/png".to_string(),
            size_bytes: 3,
        }
    }

    #[test]
    fn medical_emergencies_are_high_priority() {
        assert_eq!(EmergencyType::Medical.priority(), Priority::High);
        assert_eq!(EmergencyType::Housing.priority(), Priority::Normal);
        assert_eq!(EmergencyType::NaturalDisaster.priority(), Priority::Normal);
    }

    #[test]
    fn emergency_record_sets_deadline_and_status() {
        let now = Utc::now();
        let record = TransactionRecord::emergency_withdrawal(
            AccountId::new("u1"),
            5000.0,
            PaymentMethod::Upi,
            EmergencyType::Medical,
            "Hospital admission for surgery".to_string(),
            vec![sample_doc()],
            now,
        );
        let Ok(record) = record else {
            panic!("valid emergency record rejected");
        };
        assert_eq!(record.status, TransactionStatus::PendingReview);
        let Some(details) = record.emergency.as_ref() else {
            panic!("emergency details missing");
        };
        assert_eq!(details.priority, Priority::High);
        assert_eq!(details.review_deadline, now + Duration::hours(24));
    }

    #[test]
    fn review_mirrors_record() {
        let record = TransactionRecord::emergency_withdrawal(
            AccountId::new("u1"),
            750.0,
            PaymentMethod::Bank,
            EmergencyType::Family,
            "Family member needs urgent travel".to_string(),
            vec![sample_doc()],
            Utc::now(),
        );
        let Ok(record) = record else {
            panic!("valid emergency record rejected");
        };
        let Some(review) = EmergencyReview::for_record(&record, "", "u1@example.com") else {
            panic!("review should be built for emergency records");
        };
        assert_eq!(review.withdrawal_id, record.id);
        assert_eq!(review.user_name, "User");
        assert_eq!(review.document_metadata.len(), 1);
        assert!(!review.processed);
    }

    #[test]
    fn emergency_record_requires_description_and_documents() {
        let build = |description: &str, documents: Vec<AttachedDocument>| {
            TransactionRecord::emergency_withdrawal(
                AccountId::new("u1"),
                500.0,
                PaymentMethod::Bank,
                EmergencyType::Medical,
                description.to_string(),
                documents,
                Utc::now(),
            )
        };
        assert!(matches!(
            build("too short", vec![sample_doc()]),
            Err(ValidationError::DescriptionTooShort { length: 9, minimum: 20 })
        ));
        assert!(matches!(
            build("hospital admission for surgery", Vec::new()),
            Err(ValidationError::NoDocuments)
        ));
        assert!(build("hospital admission for surgery", vec![sample_doc()]).is_ok());
    }

    #[test]
    fn standard_withdrawal_has_no_review() {
        let record =
            TransactionRecord::withdrawal(AccountId::new("u1"), 10.0, PaymentMethod::Upi, Utc::now());
        assert!(EmergencyReview::for_record(&record, "a", "b").is_none());
        assert_eq!(record.kind.collection(), "withdrawals");
    }

    #[test]
    fn record_serializes_kind_and_skips_empty_fields() {
        let record =
            TransactionRecord::withdrawal(AccountId::new("u1"), 10.0, PaymentMethod::Upi, Utc::now());
        let Ok(value) = serde_json::to_value(&record) else {
            panic!("serialization failed");
        };
        assert_eq!(value["kind"], "withdrawal");
        assert_eq!(value["status"], "processing");
        assert_eq!(value["paymentMethod"], "upi");
        assert!(value.get("emergency").is_none());
    }
}
