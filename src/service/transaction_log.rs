//! Transaction log: appends ledger records and rebuilds the merged history.
//!
//! Each record kind lives in its own collection. History is assembled by
//! querying every selected collection concurrently, tagging each row with the
//! kind of the collection it came from, merging, re-sorting by `createdAt`
//! (newest first, ties broken by id) and truncating to the requested limit.
//!
//! Each collection contributes at most `limit × overfetch` rows. With the
//! default factor of 1 the merged page is exact only when the newest `limit`
//! records of every kind cover the newest `limit` overall, which always holds
//! for the first page of a single-kind filter.

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::{AccountId, RecordId, TransactionKind, TransactionRecord};
use crate::error::SaviumError;
use crate::store::{Direction, DocumentStore, Query};

/// Which record kinds a history listing includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionFilter {
    /// Every kind.
    #[default]
    All,
    /// Deposits only.
    Deposits,
    /// Standard withdrawals only.
    Withdrawals,
    /// Emergency withdrawals only.
    Emergency,
}

impl TransactionFilter {
    /// Kinds selected by this filter.
    #[must_use]
    pub const fn kinds(self) -> &'static [TransactionKind] {
        match self {
            Self::All => &TransactionKind::ALL,
            Self::Deposits => &[TransactionKind::Deposit],
            Self::Withdrawals => &[TransactionKind::Withdrawal],
            Self::Emergency => &[TransactionKind::EmergencyWithdrawal],
        }
    }
}

/// A finite, newest-first page of ledger records.
///
/// Consuming; call [`TransactionLog::list_transactions`] again for fresh data.
#[derive(Debug)]
pub struct TransactionHistory {
    records: std::vec::IntoIter<TransactionRecord>,
}

impl Iterator for TransactionHistory {
    type Item = TransactionRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for TransactionHistory {}

/// Serializes a record into its stored document body.
///
/// # Errors
///
/// Returns [`SaviumError::Internal`] if the record cannot be serialized.
pub fn record_document(record: &TransactionRecord) -> Result<Value, SaviumError> {
    serde_json::to_value(record).map_err(|e| SaviumError::Internal(format!("record encoding: {e}")))
}

/// Parses a stored document as a record of `kind`.
///
/// The kind comes from the collection, not from the stored body, and the
/// document id fills in a missing record id.
fn parse_record(kind: TransactionKind, id: &str, mut data: Value) -> Option<TransactionRecord> {
    if let Value::Object(map) = &mut data {
        map.insert("kind".to_string(), Value::String(kind.to_string()));
        map.entry("id").or_insert_with(|| Value::String(id.to_string()));
    }
    match serde_json::from_value(data) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(%kind, id, error = %e, "skipping malformed ledger record");
            None
        }
    }
}

/// Append and history operations over the record collections.
#[derive(Debug, Clone)]
pub struct TransactionLog {
    store: Arc<dyn DocumentStore>,
    overfetch: usize,
}

impl TransactionLog {
    /// Creates a log over `store`. `overfetch` is clamped to at least 1.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, overfetch: usize) -> Self {
        Self {
            store,
            overfetch: overfetch.max(1),
        }
    }

    /// Writes a single record to the collection of its kind.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::StoreWrite`] on store failure.
    pub async fn append(&self, record: &TransactionRecord) -> Result<RecordId, SaviumError> {
        let data = record_document(record)?;
        self.store
            .set_document(record.kind.collection(), &record.id.to_string(), data)
            .await?;
        tracing::info!(
            account_id = %record.account_id,
            record_id = %record.id,
            kind = %record.kind,
            amount = record.amount,
            "ledger record appended"
        );
        Ok(record.id)
    }

    /// Lists the newest `limit` records of every kind for an account.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::StoreRead`] if any collection query fails.
    pub async fn list_transactions(
        &self,
        account_id: &AccountId,
        limit: usize,
    ) -> Result<TransactionHistory, SaviumError> {
        self.list_filtered(account_id, limit, TransactionFilter::All)
            .await
    }

    /// Lists the newest `limit` records of the kinds selected by `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::StoreRead`] if any collection query fails.
    pub async fn list_filtered(
        &self,
        account_id: &AccountId,
        limit: usize,
        filter: TransactionFilter,
    ) -> Result<TransactionHistory, SaviumError> {
        if limit == 0 {
            return Ok(TransactionHistory {
                records: Vec::new().into_iter(),
            });
        }

        let per_collection = limit.saturating_mul(self.overfetch);
        let queries = filter.kinds().iter().map(|&kind| {
            let query = Query::collection(kind.collection())
                .where_eq("userId", account_id.as_str())
                .order_by("createdAt", Direction::Descending)
                .limit(per_collection);
            let store = Arc::clone(&self.store);
            async move {
                let docs = store.query(&query).await?;
                Ok::<_, SaviumError>(
                    docs.into_iter()
                        .filter_map(|doc| parse_record(kind, &doc.id, doc.data))
                        .collect::<Vec<_>>(),
                )
            }
        });

        let mut records: Vec<TransactionRecord> =
            try_join_all(queries).await?.into_iter().flatten().collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        records.truncate(limit);

        tracing::debug!(%account_id, ?filter, returned = records.len(), "history listed");
        Ok(TransactionHistory {
            records: records.into_iter(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::domain::{AttachedDocument, EmergencyType, PaymentMethod, TransactionStatus, timestamp};
    use crate::store::MemoryStore;

    fn log() -> (Arc<MemoryStore>, TransactionLog) {
        let store = Arc::new(MemoryStore::new());
        let log = TransactionLog::new(Arc::clone(&store) as Arc<dyn DocumentStore>, 1);
        (store, log)
    }

    async fn seed_fixture(log: &TransactionLog, account: &AccountId) {
        let base = timestamp::now() - Duration::days(30);
        let at = |hours: i64| base + Duration::hours(hours);

        for h in [1, 5, 9] {
            let r = TransactionRecord::deposit(account.clone(), 1000.0, "inr", None, at(h));
            assert!(log.append(&r).await.is_ok());
        }
        for h in [3, 7] {
            let r = TransactionRecord::withdrawal(account.clone(), 200.0, PaymentMethod::Upi, at(h));
            assert!(log.append(&r).await.is_ok());
        }
        let r = TransactionRecord::emergency_withdrawal(
            account.clone(),
            500.0,
            PaymentMethod::Bank,
            EmergencyType::Medical,
            "hospital admission for surgery".to_string(),
            vec![AttachedDocument {
                encoded_content: "data:application/pdf;base64,JVBERg==".to_string(),
                name: "discharge.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                size_bytes: 4,
            }],
            at(6),
        );
        let Ok(r) = r else {
            panic!("fixture emergency record invalid");
        };
        assert!(log.append(&r).await.is_ok());
    }

    #[tokio::test]
    async fn merged_history_is_sorted_and_tagged() {
        let (_, log) = log();
        let account = AccountId::new("u1");
        seed_fixture(&log, &account).await;

        let Ok(history) = log.list_transactions(&account, 10).await else {
            panic!("history failed");
        };
        let records: Vec<TransactionRecord> = history.collect();
        assert_eq!(records.len(), 6);
        for pair in records.windows(2) {
            assert!(pair[0].created_at > pair[1].created_at);
        }
        let kinds: Vec<TransactionKind> = records.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TransactionKind::Deposit,
                TransactionKind::Withdrawal,
                TransactionKind::EmergencyWithdrawal,
                TransactionKind::Deposit,
                TransactionKind::Withdrawal,
                TransactionKind::Deposit,
            ]
        );
        assert_eq!(records[2].status, TransactionStatus::PendingReview);
    }

    #[tokio::test]
    async fn truncates_after_merge() {
        let (_, log) = log();
        let account = AccountId::new("u1");
        seed_fixture(&log, &account).await;

        let Ok(history) = log.list_transactions(&account, 2).await else {
            panic!("history failed");
        };
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn filter_restricts_collections() {
        let (_, log) = log();
        let account = AccountId::new("u1");
        seed_fixture(&log, &account).await;

        let Ok(history) = log
            .list_filtered(&account, 10, TransactionFilter::Withdrawals)
            .await
        else {
            panic!("history failed");
        };
        let records: Vec<_> = history.collect();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind == TransactionKind::Withdrawal));
    }

    #[tokio::test]
    async fn other_accounts_are_excluded() {
        let (_, log) = log();
        seed_fixture(&log, &AccountId::new("u1")).await;

        let Ok(history) = log.list_transactions(&AccountId::new("u2"), 10).await else {
            panic!("history failed");
        };
        assert_eq!(history.len(), 0);
    }

    #[tokio::test]
    async fn kind_comes_from_collection() {
        let (store, log) = log();
        let account = AccountId::new("u1");
        let record = TransactionRecord::withdrawal(account.clone(), 10.0, PaymentMethod::Bank, Utc::now());
        let Ok(mut doc) = record_document(&record) else {
            panic!("encode failed");
        };
        doc["kind"] = Value::String("deposit".to_string());
        let put = store
            .set_document("withdrawals", &record.id.to_string(), doc)
            .await;
        assert!(put.is_ok());

        let Ok(history) = log.list_transactions(&account, 5).await else {
            panic!("history failed");
        };
        let records: Vec<_> = history.collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, TransactionKind::Withdrawal);
    }

    #[tokio::test]
    async fn zero_limit_is_empty() {
        let (_, log) = log();
        let account = AccountId::new("u1");
        seed_fixture(&log, &account).await;
        let Ok(history) = log.list_transactions(&account, 0).await else {
            panic!("history failed");
        };
        assert_eq!(history.len(), 0);
    }
}
