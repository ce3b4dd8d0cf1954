//! Deposits: payment-intent creation and recording of confirmed payments.
//!
//! The payment widget and the payment processor are external. This module
//! asks the deposit backend for a payment intent and keeps a record of every
//! intent it issued, then records the widget's reported outcome against that
//! record. Only a successful outcome for an issued, not yet recorded intent
//! of the same account, amount and currency touches the ledger, and it does
//! so exactly once.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::account::{ACCOUNTS_COLLECTION, BALANCE_PATH};
use crate::domain::{AccountId, EventBus, LedgerEvent, RecordId, TransactionRecord, timestamp};
use crate::error::{SaviumError, ValidationError};
use crate::service::account_service::AccountService;
use crate::service::transaction_log::record_document;
use crate::store::{DocumentStore, WriteBatch};

/// Timeout of calls to the deposit backend.
const BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Collection holding the intents issued through this service, keyed by
/// processor reference.
pub const DEPOSIT_INTENTS_COLLECTION: &str = "depositIntents";

const INTENT_STATUS_PATH: &str = "status";

/// Supported deposit currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// Indian rupee.
    Inr,
    /// US dollar.
    Usd,
}

impl Currency {
    /// Lowercase ISO code as sent to the payment processor.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Inr => "inr",
            Self::Usd => "usd",
        }
    }

    /// Smallest accepted deposit, in major units.
    #[must_use]
    pub const fn minimum(self) -> f64 {
        match self {
            Self::Inr => 100.0,
            Self::Usd => 1.0,
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Inr => "₹",
            Self::Usd => "$",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = SaviumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inr" => Ok(Self::Inr),
            "usd" => Ok(Self::Usd),
            other => Err(SaviumError::InvalidRequest(format!("unsupported currency: {other}"))),
        }
    }
}

/// Converts a major-unit amount to minor units (paise, cents).
#[must_use]
pub fn to_minor_units(amount: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let minor = (amount * 100.0).round() as i64;
    minor
}

/// Converts a minor-unit amount back to major units.
#[must_use]
pub fn from_minor_units(minor: i64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let major = minor as f64 / 100.0;
    major
}

/// Body sent to the deposit backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositIntentRequest {
    /// Amount in minor units.
    pub amount: i64,
    /// Lowercase currency code.
    pub currency: String,
    /// Statement description.
    pub description: String,
}

/// Payment intent returned by the deposit backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepositIntent {
    /// Secret the payment widget uses to confirm the payment.
    pub client_secret: String,
    /// Processor reference of the intent.
    pub payment_intent_id: String,
}

/// Lifecycle of an issued intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Issued; no payment recorded yet.
    Created,
    /// A deposit was recorded for it.
    Recorded,
}

impl IntentStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Recorded => "recorded",
        }
    }
}

/// Stored record of an intent issued to an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedIntent {
    /// Account the intent was issued to.
    #[serde(rename = "userId")]
    pub account_id: AccountId,
    /// Amount in minor units, as sent to the backend.
    pub amount_minor: i64,
    /// Deposit currency.
    pub currency: Currency,
    /// Whether a deposit was recorded for it.
    pub status: IntentStatus,
    /// Issue time.
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// The deposit record, once recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
}

/// Outcome reported by the payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// The payment settled.
    Succeeded {
        /// Processor reference of the settled intent.
        payment_intent_id: String,
    },
    /// The payment was declined or abandoned.
    Failed {
        /// Processor message.
        message: String,
    },
}

/// Client of the deposit-intent endpoint.
#[async_trait]
pub trait DepositIntentClient: Send + Sync + fmt::Debug {
    /// Creates a payment intent on behalf of the bearer of `token`.
    async fn create_intent(
        &self,
        token: &str,
        request: &DepositIntentRequest,
    ) -> Result<DepositIntent, SaviumError>;
}

/// Error body of the deposit backend.
#[derive(Debug, Deserialize)]
struct BackendError {
    error: Option<String>,
    detail: Option<String>,
}

/// [`DepositIntentClient`] calling `POST {base_url}/api/deposit` with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpDepositIntentClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDepositIntentClient {
    /// Creates a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::Internal`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SaviumError> {
        let http = reqwest::Client::builder()
            .timeout(BACKEND_TIMEOUT)
            .build()
            .map_err(|e| SaviumError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DepositIntentClient for HttpDepositIntentClient {
    async fn create_intent(
        &self,
        token: &str,
        request: &DepositIntentRequest,
    ) -> Result<DepositIntent, SaviumError> {
        let url = format!("{}/api/deposit", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| SaviumError::DepositIntentFailed {
                status: 0,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<BackendError>()
                .await
                .ok()
                .and_then(|b| b.error.or(b.detail))
                .unwrap_or_else(|| "Failed to create payment".to_string());
            return Err(SaviumError::DepositIntentFailed {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<DepositIntent>()
            .await
            .map_err(|e| SaviumError::DepositIntentFailed {
                status: status.as_u16(),
                message: format!("malformed intent: {e}"),
            })
    }
}

/// Confirmed deposit and resulting balance.
#[derive(Debug, Clone)]
pub struct DepositReceipt {
    /// The appended deposit record.
    pub record: TransactionRecord,
    /// Balance after the credit.
    pub new_balance: f64,
}

/// Deposit intake.
#[derive(Debug, Clone)]
pub struct DepositService {
    store: Arc<dyn DocumentStore>,
    accounts: AccountService,
    client: Arc<dyn DepositIntentClient>,
    event_bus: EventBus,
}

impl DepositService {
    /// Creates a new `DepositService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        client: Arc<dyn DepositIntentClient>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            accounts: AccountService::new(Arc::clone(&store)),
            store,
            client,
            event_bus,
        }
    }

    /// Requests a payment intent for `amount` major units of `currency` on
    /// behalf of `account_id`, whose identity-provider ID token is
    /// `id_token`, and records it as issued.
    ///
    /// The currency minimum is enforced before any backend call.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AmountBelowMinimum`],
    /// [`SaviumError::DepositIntentFailed`], [`SaviumError::Conflict`] when
    /// the backend repeats a reference, or a store error.
    pub async fn create_intent(
        &self,
        account_id: &AccountId,
        id_token: &str,
        amount: f64,
        currency: Currency,
        description: Option<String>,
    ) -> Result<DepositIntent, SaviumError> {
        if !amount.is_finite() || amount < currency.minimum() {
            return Err(ValidationError::AmountBelowMinimum {
                minimum: currency.minimum(),
                currency: currency.code().to_uppercase(),
            }
            .into());
        }

        let request = DepositIntentRequest {
            amount: to_minor_units(amount),
            currency: currency.code().to_string(),
            description: description.unwrap_or_else(|| {
                format!(
                    "Deposit of {}{amount:.2} to investment account",
                    currency.symbol()
                )
            }),
        };
        let intent = self.client.create_intent(id_token, &request).await?;
        if intent.payment_intent_id.trim().is_empty() {
            return Err(SaviumError::DepositIntentFailed {
                status: 0,
                message: "intent without a reference".to_string(),
            });
        }

        let issued = IssuedIntent {
            account_id: account_id.clone(),
            amount_minor: request.amount,
            currency,
            status: IntentStatus::Created,
            created_at: timestamp::now(),
            record_id: None,
        };
        let data = serde_json::to_value(&issued)
            .map_err(|e| SaviumError::Internal(format!("intent encoding: {e}")))?;
        let batch = WriteBatch::new()
            .require_absent(DEPOSIT_INTENTS_COLLECTION, intent.payment_intent_id.as_str())
            .set(DEPOSIT_INTENTS_COLLECTION, intent.payment_intent_id.as_str(), data);
        self.store.commit(batch).await?;

        tracing::info!(
            %account_id,
            amount_minor = request.amount,
            %currency,
            payment_intent_id = %intent.payment_intent_id,
            "deposit intent created"
        );
        Ok(intent)
    }

    /// Records the widget's payment outcome.
    ///
    /// A successful payment must name an intent issued to `account_id` for
    /// the same amount and currency that has not been recorded yet. The
    /// deposit, the account credit and the intent's `recorded` mark commit in
    /// one batch; a failed payment writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::PaymentFailed`] for a failed outcome,
    /// [`SaviumError::DocumentNotFound`] for an intent this account was never
    /// issued, [`SaviumError::InvalidRequest`] when amount or currency differ
    /// from the intent, [`SaviumError::Conflict`] when the intent is already
    /// recorded or the balance moved during the commit,
    /// [`SaviumError::AccountNotFound`], or a store error.
    pub async fn record_payment(
        &self,
        account_id: &AccountId,
        amount: f64,
        currency: Currency,
        outcome: PaymentOutcome,
    ) -> Result<DepositReceipt, SaviumError> {
        let payment_intent_id = match outcome {
            PaymentOutcome::Succeeded { payment_intent_id } => payment_intent_id,
            PaymentOutcome::Failed { message } => {
                tracing::warn!(%account_id, %message, "payment failed");
                return Err(SaviumError::PaymentFailed(message));
            }
        };
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ValidationError::InvalidAmount.into());
        }

        let issued = self.issued_intent(account_id, &payment_intent_id).await?;
        if issued.status == IntentStatus::Recorded {
            return Err(SaviumError::Conflict(format!(
                "payment {payment_intent_id} is already recorded"
            )));
        }
        if issued.currency != currency || issued.amount_minor != to_minor_units(amount) {
            tracing::warn!(
                %account_id,
                %payment_intent_id,
                reported_minor = to_minor_units(amount),
                issued_minor = issued.amount_minor,
                "payment does not match its intent"
            );
            return Err(SaviumError::InvalidRequest(
                "payment does not match its deposit intent".to_string(),
            ));
        }
        let amount = from_minor_units(issued.amount_minor);

        let account = self.accounts.get_account(account_id).await?;
        let now = timestamp::now();
        let record = TransactionRecord::deposit(
            account_id.clone(),
            amount,
            currency.code(),
            Some(payment_intent_id.clone()),
            now,
        );

        let balance = account.balance();
        let new_balance = balance + amount;
        let batch = WriteBatch::new()
            .require(ACCOUNTS_COLLECTION, account_id.as_str(), BALANCE_PATH, balance)
            .require(
                DEPOSIT_INTENTS_COLLECTION,
                payment_intent_id.as_str(),
                INTENT_STATUS_PATH,
                IntentStatus::Created.as_str(),
            )
            .set(
                record.kind.collection(),
                record.id.to_string(),
                record_document(&record)?,
            )
            .update(
                ACCOUNTS_COLLECTION,
                account_id.as_str(),
                vec![
                    (BALANCE_PATH.to_string(), json!(new_balance)),
                    (
                        "financialInfo.totalInvested".to_string(),
                        json!(account.financial_info.total_invested + amount),
                    ),
                    (
                        "financialInfo.lastDepositAt".to_string(),
                        json!(timestamp::format(&now)),
                    ),
                ],
            )
            .update(
                DEPOSIT_INTENTS_COLLECTION,
                payment_intent_id.as_str(),
                vec![
                    (
                        INTENT_STATUS_PATH.to_string(),
                        json!(IntentStatus::Recorded.as_str()),
                    ),
                    ("recordId".to_string(), json!(record.id.to_string())),
                ],
            );
        self.store.commit(batch).await?;

        let _ = self.event_bus.publish(LedgerEvent::DepositRecorded {
            account_id: account_id.clone(),
            record_id: record.id,
            amount,
            new_balance,
            timestamp: now,
        });
        tracing::info!(%account_id, record_id = %record.id, amount, new_balance, "deposit recorded");

        Ok(DepositReceipt {
            record,
            new_balance,
        })
    }

    /// Loads an intent issued to `account_id`. Intents of other accounts
    /// read as missing.
    async fn issued_intent(
        &self,
        account_id: &AccountId,
        payment_intent_id: &str,
    ) -> Result<IssuedIntent, SaviumError> {
        let not_found = || SaviumError::DocumentNotFound {
            collection: DEPOSIT_INTENTS_COLLECTION.to_string(),
            id: payment_intent_id.to_string(),
        };
        let data = self
            .store
            .get_document(DEPOSIT_INTENTS_COLLECTION, payment_intent_id)
            .await?
            .ok_or_else(not_found)?;
        let issued: IssuedIntent = serde_json::from_value(data)
            .map_err(|e| SaviumError::StoreRead(format!("malformed deposit intent: {e}")))?;
        if issued.account_id != *account_id {
            tracing::warn!(%account_id, %payment_intent_id, "payment names another account's intent");
            return Err(not_found());
        }
        Ok(issued)
    }
}
