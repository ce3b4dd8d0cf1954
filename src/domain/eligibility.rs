//! Standard-withdrawal eligibility policy.
//!
//! [`EligibilityPolicy::evaluate`] is pure: it looks only at the account and
//! the supplied `now`. Rules are checked in order and the first match wins:
//!
//! 1. account younger than `min_account_age` → ineligible;
//! 2. last withdrawal within `cooldown` → ineligible;
//! 3. otherwise eligible.
//!
//! Emergency withdrawals never consult this policy.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::Account;

/// Outcome of an eligibility evaluation. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResult {
    /// Whether a standard withdrawal is currently permitted.
    pub eligible: bool,
    /// Human-readable reason; present iff `eligible` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Promised processing time in days (at least 1).
    pub processing_days: u32,
}

impl EligibilityResult {
    fn eligible(processing_days: u32) -> Self {
        Self {
            eligible: true,
            reason: None,
            processing_days,
        }
    }

    fn ineligible(reason: String, processing_days: u32) -> Self {
        Self {
            eligible: false,
            reason: Some(reason),
            processing_days,
        }
    }
}

/// How often the account has been withdrawing, for analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalFrequency {
    /// No previous withdrawal.
    First,
    /// Last withdrawal less than 7 days ago.
    Frequent,
    /// Last withdrawal less than 30 days ago.
    Regular,
    /// Last withdrawal 30 or more days ago.
    Infrequent,
}

/// Thresholds of the standard-withdrawal policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityPolicy {
    /// Minimum account age before the first withdrawal.
    pub min_account_age: Duration,
    /// Minimum gap between two withdrawals.
    pub cooldown: Duration,
    /// Processing SLA reported to the user.
    pub processing_days: u32,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            min_account_age: Duration::days(7),
            cooldown: Duration::days(3),
            processing_days: 1,
        }
    }
}

impl EligibilityPolicy {
    /// Creates a policy from day counts. `processing_days` is clamped to 1.
    #[must_use]
    pub fn from_days(min_account_age_days: i64, cooldown_days: i64, processing_days: u32) -> Self {
        Self {
            min_account_age: Duration::days(min_account_age_days),
            cooldown: Duration::days(cooldown_days),
            processing_days: processing_days.max(1),
        }
    }

    /// Decides whether `account` may make a standard withdrawal at `now`.
    #[must_use]
    pub fn evaluate(&self, account: &Account, now: DateTime<Utc>) -> EligibilityResult {
        if account.age_at(now) < self.min_account_age {
            return EligibilityResult::ineligible(
                format!(
                    "Accounts less than {} days old cannot make withdrawals",
                    self.min_account_age.num_days()
                ),
                self.processing_days,
            );
        }

        if let Some(elapsed) = account.since_last_withdrawal(now)
            && elapsed < self.cooldown
        {
            return EligibilityResult::ineligible(
                format!(
                    "You can only make one withdrawal every {} days",
                    self.cooldown.num_days()
                ),
                self.processing_days,
            );
        }

        EligibilityResult::eligible(self.processing_days)
    }
}

/// Classifies how recently the account last withdrew.
#[must_use]
pub fn withdrawal_frequency(account: &Account, now: DateTime<Utc>) -> WithdrawalFrequency {
    match account.since_last_withdrawal(now).map(|d| d.num_days()) {
        None => WithdrawalFrequency::First,
        Some(days) if days < 7 => WithdrawalFrequency::Frequent,
        Some(days) if days < 30 => WithdrawalFrequency::Regular,
        Some(_) => WithdrawalFrequency::Infrequent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountId;

    fn account(created_days_ago: i64, last_withdrawal: Option<Duration>, now: DateTime<Utc>) -> Account {
        let mut account = Account::new(
            AccountId::new("u1"),
            "Test",
            "t@example.com",
            now - Duration::days(created_days_ago),
        );
        account.financial_info.portfolio_value = 1000.0;
        account.financial_info.last_withdrawal_at = last_withdrawal.map(|ago| now - ago);
        account
    }

    #[test]
    fn young_account_is_ineligible() {
        let now = Utc::now();
        let result = EligibilityPolicy::default().evaluate(&account(2, None, now), now);
        assert!(!result.eligible);
        assert_eq!(
            result.reason.as_deref(),
            Some("Accounts less than 7 days old cannot make withdrawals")
        );
        assert_eq!(result.processing_days, 1);
    }

    #[test]
    fn age_rule_holds_for_every_earlier_now() {
        let created = Utc::now();
        let policy = EligibilityPolicy::default();
        let acct = account(0, None, created);
        for hours in [0, 1, 24, 100, 167] {
            let now = created + Duration::hours(hours);
            let result = policy.evaluate(&acct, now);
            assert!(!result.eligible, "ineligible at +{hours}h");
            assert!(result.reason.as_deref().is_some_and(|r| r.contains("7 days old")));
        }
        let almost = created + Duration::days(7) - Duration::seconds(1);
        assert!(!policy.evaluate(&acct, almost).eligible);
        assert!(policy.evaluate(&acct, created + Duration::days(7)).eligible);
    }

    #[test]
    fn age_rule_wins_over_cooldown() {
        let now = Utc::now();
        let result =
            EligibilityPolicy::default().evaluate(&account(1, Some(Duration::hours(1)), now), now);
        assert!(result.reason.as_deref().is_some_and(|r| r.contains("days old")));
    }

    #[test]
    fn cooldown_boundary_exactly_three_days_is_eligible() {
        let now = Utc::now();
        let result =
            EligibilityPolicy::default().evaluate(&account(30, Some(Duration::days(3)), now), now);
        assert!(result.eligible);
        assert!(result.reason.is_none());
    }

    #[test]
    fn cooldown_boundary_one_second_short_is_ineligible() {
        let now = Utc::now();
        let ago = Duration::days(3) - Duration::seconds(1);
        let result = EligibilityPolicy::default().evaluate(&account(30, Some(ago), now), now);
        assert!(!result.eligible);
        assert_eq!(
            result.reason.as_deref(),
            Some("You can only make one withdrawal every 3 days")
        );
    }

    #[test]
    fn first_withdrawal_on_mature_account_is_eligible() {
        let now = Utc::now();
        let result = EligibilityPolicy::default().evaluate(&account(10, None, now), now);
        assert_eq!(
            result,
            EligibilityResult {
                eligible: true,
                reason: None,
                processing_days: 1
            }
        );
    }

    #[test]
    fn frequency_buckets() {
        let now = Utc::now();
        assert_eq!(withdrawal_frequency(&account(40, None, now), now), WithdrawalFrequency::First);
        assert_eq!(
            withdrawal_frequency(&account(40, Some(Duration::days(2)), now), now),
            WithdrawalFrequency::Frequent
        );
        assert_eq!(
            withdrawal_frequency(&account(40, Some(Duration::days(10)), now), now),
            WithdrawalFrequency::Regular
        );
        assert_eq!(
            withdrawal_frequency(&account(40, Some(Duration::days(30)), now), now),
            WithdrawalFrequency::Infrequent
        );
    }

    #[test]
    fn custom_policy_thresholds() {
        let now = Utc::now();
        let policy = EligibilityPolicy::from_days(14, 5, 0);
        assert_eq!(policy.processing_days, 1);
        let result = policy.evaluate(&account(10, None, now), now);
        assert_eq!(
            result.reason.as_deref(),
            Some("Accounts less than 14 days old cannot make withdrawals")
        );
    }
}
