//! Data Transfer Objects for REST request/response serialization.
//!
//! Amounts are accepted as JSON numbers or strings; see [`AmountInput`].

pub mod common_dto;
pub mod deposit_dto;
pub mod projection_dto;
pub mod session_dto;
pub mod transaction_dto;
pub mod withdrawal_dto;

pub use common_dto::*;
pub use deposit_dto::*;
pub use projection_dto::*;
pub use session_dto::*;
pub use transaction_dto::*;
pub use withdrawal_dto::*;
