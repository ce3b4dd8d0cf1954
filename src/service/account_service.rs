//! Account service: provisioning, lookup and live observation of accounts.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::account::ACCOUNTS_COLLECTION;
use crate::domain::{Account, AccountId, timestamp};
use crate::error::SaviumError;
use crate::store::{DocumentStore, DocumentWatch, WriteBatch};

/// Parses a stored account document.
///
/// # Errors
///
/// Returns [`SaviumError::StoreRead`] when the body is not a valid account.
pub fn parse_account(data: Value) -> Result<Account, SaviumError> {
    serde_json::from_value(data)
        .map_err(|e| SaviumError::StoreRead(format!("malformed account document: {e}")))
}

/// Live view of one account.
///
/// Every emission is a complete [`Account`] that replaces the previous one.
/// The subscription ends on [`AccountWatch::dispose`] or drop.
#[derive(Debug)]
pub struct AccountWatch {
    account_id: AccountId,
    inner: DocumentWatch,
}

impl AccountWatch {
    /// Waits for the next committed snapshot.
    ///
    /// Returns `None` once the store's change feed closes. Snapshots that fail
    /// to parse are logged and skipped.
    pub async fn changed(&mut self) -> Option<Account> {
        loop {
            let data = self.inner.changed().await?;
            match parse_account(data) {
                Ok(account) => return Some(account),
                Err(e) => {
                    tracing::warn!(account_id = %self.account_id, error = %e, "skipping account snapshot");
                }
            }
        }
    }

    /// Id of the observed account.
    #[must_use]
    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Ends the subscription.
    pub fn dispose(self) {
        tracing::debug!(account_id = %self.account_id, "account watch disposed");
        self.inner.dispose();
    }
}

/// Account lookup and provisioning over the `users` collection.
#[derive(Debug, Clone)]
pub struct AccountService {
    store: Arc<dyn DocumentStore>,
}

impl AccountService {
    /// Creates a service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Returns the account, creating it with an empty portfolio on first use.
    ///
    /// The create only succeeds while the document is still absent; when a
    /// concurrent first use wins, its account is re-read instead.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read or the create fails.
    pub async fn ensure_account(
        &self,
        id: &AccountId,
        name: &str,
        email: &str,
    ) -> Result<Account, SaviumError> {
        if let Some(existing) = self.store.get_document(ACCOUNTS_COLLECTION, id.as_str()).await? {
            return parse_account(existing);
        }

        let account = Account::new(id.clone(), name, email, timestamp::now());
        let data = serde_json::to_value(&account)
            .map_err(|e| SaviumError::Internal(format!("account encoding: {e}")))?;
        let create = WriteBatch::new()
            .require_absent(ACCOUNTS_COLLECTION, id.as_str())
            .set(ACCOUNTS_COLLECTION, id.as_str(), data);
        match self.store.commit(create).await {
            Ok(()) => {
                tracing::info!(account_id = %id, "account provisioned");
                Ok(account)
            }
            Err(SaviumError::Conflict(_)) => {
                tracing::debug!(account_id = %id, "account created concurrently; re-reading");
                self.get_account(id).await
            }
            Err(e) => Err(e),
        }
    }

    /// Fetches an account.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::AccountNotFound`] when it does not exist.
    pub async fn get_account(&self, id: &AccountId) -> Result<Account, SaviumError> {
        let data = self
            .store
            .get_document(ACCOUNTS_COLLECTION, id.as_str())
            .await?
            .ok_or_else(|| SaviumError::AccountNotFound(id.clone()))?;
        parse_account(data)
    }

    /// Subscribes to committed changes of an account.
    #[must_use]
    pub fn watch(&self, id: &AccountId) -> AccountWatch {
        AccountWatch {
            account_id: id.clone(),
            inner: self.store.subscribe(ACCOUNTS_COLLECTION, id.as_str()),
        }
    }
}
