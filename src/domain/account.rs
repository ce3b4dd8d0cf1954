//! Investor account and its financial profile.
//!
//! Stored as one document per user in the `users` collection. Field names
//! on the wire are camelCase; the `financialInfo.*` dotted paths are used for
//! partial updates.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AccountId;
use super::timestamp;

/// Collection holding account documents.
pub const ACCOUNTS_COLLECTION: &str = "users";

/// Dotted path of the withdrawable balance inside an account document.
pub const BALANCE_PATH: &str = "financialInfo.portfolioValue";

/// Investor profile and current balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account identifier (identity-provider user id).
    #[serde(rename = "userId")]
    pub id: AccountId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Creation time; drives the account-age eligibility rule.
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Balances and withdrawal history.
    pub financial_info: FinancialInfo,
}

/// Balances and money-movement history of an account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialInfo {
    /// Current withdrawable portfolio value.
    pub portfolio_value: f64,
    /// Cumulative deposited amount.
    #[serde(default)]
    pub total_invested: f64,
    /// Cumulative returns.
    #[serde(default)]
    pub total_returns: f64,
    /// Time of the most recent deposit commit.
    #[serde(default, with = "timestamp::option")]
    pub last_deposit_at: Option<DateTime<Utc>>,
    /// Time of the most recent withdrawal commit.
    #[serde(default, with = "timestamp::option")]
    pub last_withdrawal_at: Option<DateTime<Utc>>,
    /// Amount of the most recent withdrawal.
    #[serde(default)]
    pub last_withdrawal_amount: Option<f64>,
}

impl Account {
    /// Creates a fresh account with zeroed balances.
    #[must_use]
    pub fn new(
        id: AccountId,
        name: impl Into<String>,
        email: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            created_at,
            financial_info: FinancialInfo::default(),
        }
    }

    /// Returns the withdrawable balance.
    #[must_use]
    pub fn balance(&self) -> f64 {
        self.financial_info.portfolio_value
    }

    /// Returns how long the account has existed at `now`.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Returns the time elapsed since the last withdrawal, if any.
    #[must_use]
    pub fn since_last_withdrawal(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.financial_info.last_withdrawal_at.map(|at| now - at)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_stored_field_names() {
        let account = Account::new(AccountId::new("u1"), "Asha", "asha@example.com", Utc::now());
        let Ok(value) = serde_json::to_value(&account) else {
            panic!("serialization failed");
        };
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["financialInfo"]["portfolioValue"], 0.0);
        assert!(value["financialInfo"]["lastWithdrawalAt"].is_null());
    }

    #[test]
    fn deserializes_sparse_financial_info() {
        let raw = serde_json::json!({
            "userId": "u2",
            "createdAt": "2026-01-01T00:00:00.000Z",
            "financialInfo": { "portfolioValue": 250.5 }
        });
        let Ok(account) = serde_json::from_value::<Account>(raw) else {
            panic!("deserialization failed");
        };
        assert!((account.balance() - 250.5).abs() < f64::EPSILON);
        assert!(account.financial_info.last_withdrawal_at.is_none());
        assert!(account.name.is_empty());
    }

    #[test]
    fn age_is_measured_from_creation() {
        let now = Utc::now();
        let account = Account::new(AccountId::new("u3"), "", "", now - Duration::days(10));
        assert_eq!(account.age_at(now), Duration::days(10));
        assert!(account.since_last_withdrawal(now).is_none());
    }
}
