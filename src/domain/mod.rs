//! Domain layer: core types, policy rules, and the event system.
//!
//! This module contains the ledger's domain model: account and record
//! shapes, the eligibility policy, document encoding, projection math,
//! the event bus for broadcasting committed changes, and sessions.

pub mod account;
pub mod document;
pub mod eligibility;
pub mod event_bus;
pub mod ids;
pub mod ledger_event;
pub mod projection;
pub mod session;
pub mod timestamp;
pub mod transaction;

pub use account::{Account, FinancialInfo};
pub use document::{AttachedDocument, PendingDocument, PreviewRegistry};
pub use eligibility::{EligibilityPolicy, EligibilityResult, WithdrawalFrequency};
pub use event_bus::{AccountEvents, EventBus};
pub use ids::{AccountId, RecordId};
pub use ledger_event::LedgerEvent;
pub use session::{ActiveSession, RevocationWatch, SessionRegistry};
pub use transaction::{
    EmergencyReview, EmergencyType, PaymentMethod, Priority, TransactionKind, TransactionRecord,
    TransactionStatus,
};
