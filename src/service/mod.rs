//! Service layer: business logic orchestration.
//!
//! Services own an `Arc<dyn DocumentStore>` and publish committed changes
//! through the [`super::domain::EventBus`]:
//!
//! - [`AccountService`] provisions and observes accounts.
//! - [`TransactionLog`] appends records and rebuilds the merged history.
//! - [`WithdrawalService`] drives the withdrawal dialog and its commit.
//! - [`DepositService`] creates payment intents and records payments.
//! - [`IdentityVerifier`] checks identity-provider ID tokens at sign-in.

pub mod account_service;
pub mod deposit;
pub mod identity;
pub mod transaction_log;
pub mod withdrawal;

pub use account_service::{AccountService, AccountWatch};
pub use deposit::{
    Currency, DepositIntent, DepositIntentClient, DepositReceipt, DepositService,
    HttpDepositIntentClient, PaymentOutcome,
};
pub use identity::{HttpIdentityVerifier, IdentityVerifier, VerifiedIdentity};
pub use transaction_log::{TransactionFilter, TransactionHistory, TransactionLog};
pub use withdrawal::{
    DialogState, EligibilityReport, WithdrawalDialog, WithdrawalMode, WithdrawalReceipt,
    WithdrawalService,
};
