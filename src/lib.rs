//! # savium-ledger
//!
//! Withdrawal eligibility, emergency-withdrawal intake and transaction ledger
//! service for the Savium micro-investing platform.
//!
//! Signed-in users request standard withdrawals, gated by an account-age and
//! cooldown policy, or emergency withdrawals that bypass the policy in
//! exchange for a category, a justification and supporting documents. Every
//! request commits its ledger record, optional review record and balance
//! update as one atomic batch.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── Withdrawal / Deposit / Account services (service/)
//!     ├── EventBus, EligibilityPolicy, SessionRegistry (domain/)
//!     │
//!     └── DocumentStore (store/): in-memory or PostgreSQL
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
pub mod ws;
