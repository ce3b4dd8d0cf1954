//! Domain events reflecting committed ledger changes.
//!
//! Every commit emits a [`LedgerEvent`] through the [`super::EventBus`].
//! Events are broadcast to WebSocket subscribers of the `transactions` topic.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::transaction::{EmergencyType, Priority, TransactionStatus};
use super::{AccountId, RecordId};

/// Domain event emitted after every committed ledger change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A confirmed payment was recorded as a deposit.
    DepositRecorded {
        /// Owning account.
        account_id: AccountId,
        /// Deposit record id.
        record_id: RecordId,
        /// Deposited amount.
        amount: f64,
        /// Balance after the deposit.
        new_balance: f64,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A standard withdrawal was committed.
    WithdrawalCommitted {
        /// Owning account.
        account_id: AccountId,
        /// Withdrawal record id.
        record_id: RecordId,
        /// Withdrawn amount.
        amount: f64,
        /// Initial record status.
        status: TransactionStatus,
        /// Balance after the withdrawal.
        new_balance: f64,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An emergency withdrawal request was filed for review.
    EmergencyRequestFiled {
        /// Owning account.
        account_id: AccountId,
        /// Emergency withdrawal record id (also the review id).
        record_id: RecordId,
        /// Requested amount.
        amount: f64,
        /// Emergency category.
        emergency_type: EmergencyType,
        /// Review priority.
        priority: Priority,
        /// Time by which a reviewer must act.
        review_deadline: DateTime<Utc>,
        /// Balance after the withdrawal.
        new_balance: f64,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl LedgerEvent {
    /// Returns the account this event belongs to.
    #[must_use]
    pub fn account_id(&self) -> &AccountId {
        match self {
            Self::DepositRecorded { account_id, .. }
            | Self::WithdrawalCommitted { account_id, .. }
            | Self::EmergencyRequestFiled { account_id, .. } => account_id,
        }
    }

    /// Returns the record the event refers to.
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::DepositRecorded { record_id, .. }
            | Self::WithdrawalCommitted { record_id, .. }
            | Self::EmergencyRequestFiled { record_id, .. } => *record_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::DepositRecorded { .. } => "deposit_recorded",
            Self::WithdrawalCommitted { .. } => "withdrawal_committed",
            Self::EmergencyRequestFiled { .. } => "emergency_request_filed",
        }
    }
}
