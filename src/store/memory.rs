//! In-memory document store.
//!
//! Collections live in a `tokio::sync::RwLock`. Batches are applied under a
//! single write lock, so readers never observe a half-applied batch.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};

use super::{
    CHANGE_FEED_CAPACITY, Direction, Document, DocumentChange, DocumentStore, DocumentWatch, FieldUpdates,
    Precondition, Query, WriteBatch, WriteOp, apply_updates, compare_values, get_path,
    matches_filters,
};
use crate::error::SaviumError;

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// Process-local [`DocumentStore`].
#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    changes: broadcast::Sender<DocumentChange>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            collections: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Number of documents in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn publish(&self, collection: &str, id: &str, data: &Value) {
        // No receivers is fine.
        let _ = self.changes.send(DocumentChange {
            collection: collection.to_string(),
            id: id.to_string(),
            data: data.clone(),
        });
    }
}

fn check_precondition(collections: &Collections, pre: &Precondition) -> Result<(), SaviumError> {
    pre.check(collections.get(pre.collection()).and_then(|c| c.get(pre.id())))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, SaviumError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn set_document(&self, collection: &str, id: &str, data: Value) -> Result<(), SaviumError> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data.clone());
        self.publish(collection, id, &data);
        Ok(())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: FieldUpdates,
    ) -> Result<(), SaviumError> {
        let updated = {
            let mut guard = self.collections.write().await;
            let doc = guard
                .get_mut(collection)
                .and_then(|c| c.get_mut(id))
                .ok_or_else(|| SaviumError::DocumentNotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            apply_updates(doc, &fields);
            doc.clone()
        };
        self.publish(collection, id, &updated);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, SaviumError> {
        let guard = self.collections.read().await;
        let Some(collection) = guard.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut docs: Vec<Document> = collection
            .iter()
            .filter(|(_, data)| matches_filters(data, &query.filters))
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect();
        drop(guard);

        if let Some(order) = &query.order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(get_path(&a.data, &order.field), get_path(&b.data, &order.field));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), SaviumError> {
        let mut changed = Vec::with_capacity(batch.ops().len());
        {
            let mut guard = self.collections.write().await;
            for pre in batch.preconditions() {
                check_precondition(&guard, pre)?;
            }

            // Stage every write on copies first so a missing update target
            // leaves the store untouched.
            let mut staged: Vec<(String, String, Value)> = Vec::with_capacity(batch.ops().len());
            for op in batch.ops() {
                match op {
                    WriteOp::Set { collection, id, data } => {
                        staged.push((collection.clone(), id.clone(), data.clone()));
                    }
                    WriteOp::Update { collection, id, fields } => {
                        let base = staged
                            .iter()
                            .rev()
                            .find(|(c, i, _)| c == collection && i == id)
                            .map(|(_, _, data)| data.clone())
                            .or_else(|| guard.get(collection).and_then(|c| c.get(id)).cloned())
                            .ok_or_else(|| SaviumError::DocumentNotFound {
                                collection: collection.clone(),
                                id: id.clone(),
                            })?;
                        let mut doc = base;
                        apply_updates(&mut doc, fields);
                        staged.push((collection.clone(), id.clone(), doc));
                    }
                }
            }

            for (collection, id, data) in staged {
                guard
                    .entry(collection.clone())
                    .or_default()
                    .insert(id.clone(), data.clone());
                changed.push((collection, id, data));
            }
        }

        for (collection, id, data) in &changed {
            self.publish(collection, id, data);
        }
        tracing::debug!(writes = changed.len(), "batch committed");
        Ok(())
    }

    fn subscribe(&self, collection: &str, id: &str) -> DocumentWatch {
        DocumentWatch::new(collection, id, self.changes.subscribe())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_and_missing() {
        let store = MemoryStore::new();
        let result = store.set_document("users", "u1", json!({ "name": "A" })).await;
        assert!(result.is_ok());

        let Ok(Some(doc)) = store.get_document("users", "u1").await else {
            panic!("document should exist");
        };
        assert_eq!(doc["name"], "A");
        assert!(matches!(store.get_document("users", "nope").await, Ok(None)));
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = MemoryStore::new();
        let result = store
            .update_document("users", "u1", vec![("name".into(), json!("B"))])
            .await;
        assert!(matches!(result, Err(SaviumError::DocumentNotFound { .. })));
    }

    #[tokio::test]
    async fn query_filters_orders_and_limits() {
        let store = MemoryStore::new();
        for (id, user, at) in [
            ("a", "u1", "2026-01-01T00:00:00.000Z"),
            ("b", "u2", "2026-01-03T00:00:00.000Z"),
            ("c", "u1", "2026-01-02T00:00:00.000Z"),
            ("d", "u1", "2026-01-04T00:00:00.000Z"),
        ] {
            let _ = store
                .set_document("deposits", id, json!({ "userId": user, "createdAt": at }))
                .await;
        }

        let query = Query::collection("deposits")
            .where_eq("userId", "u1")
            .order_by("createdAt", Direction::Descending)
            .limit(2);
        let Ok(docs) = store.query(&query).await else {
            panic!("query failed");
        };
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c"]);
    }

    #[tokio::test]
    async fn commit_applies_all_writes() {
        let store = MemoryStore::new();
        let _ = store
            .set_document("users", "u1", json!({ "financialInfo": { "portfolioValue": 100.0 } }))
            .await;

        let batch = WriteBatch::new()
            .require("users", "u1", "financialInfo.portfolioValue", 100.0)
            .set("withdrawals", "w1", json!({ "amount": 40.0 }))
            .update(
                "users",
                "u1",
                vec![("financialInfo.portfolioValue".into(), json!(60.0))],
            );
        assert!(store.commit(batch).await.is_ok());

        let Ok(Some(user)) = store.get_document("users", "u1").await else {
            panic!("user missing");
        };
        assert_eq!(user["financialInfo"]["portfolioValue"], 60.0);
        assert_eq!(store.count("withdrawals").await, 1);
    }

    #[tokio::test]
    async fn failed_precondition_writes_nothing() {
        let store = MemoryStore::new();
        let _ = store
            .set_document("users", "u1", json!({ "financialInfo": { "portfolioValue": 50.0 } }))
            .await;

        let batch = WriteBatch::new()
            .require("users", "u1", "financialInfo.portfolioValue", 100.0)
            .set("withdrawals", "w1", json!({ "amount": 40.0 }))
            .update(
                "users",
                "u1",
                vec![("financialInfo.portfolioValue".into(), json!(60.0))],
            );
        let result = store.commit(batch).await;
        assert!(matches!(result, Err(SaviumError::Conflict(_))));
        assert_eq!(store.count("withdrawals").await, 0);

        let Ok(Some(user)) = store.get_document("users", "u1").await else {
            panic!("user missing");
        };
        assert_eq!(user["financialInfo"]["portfolioValue"], 50.0);
    }

    #[tokio::test]
    async fn create_guard_keeps_existing_document() {
        let store = MemoryStore::new();
        let _ = store
            .set_document("users", "u1", json!({ "financialInfo": { "portfolioValue": 500.0 } }))
            .await;

        let batch = WriteBatch::new()
            .require_absent("users", "u1")
            .set("users", "u1", json!({ "financialInfo": { "portfolioValue": 0.0 } }));
        assert!(matches!(store.commit(batch).await, Err(SaviumError::Conflict(_))));

        let Ok(Some(user)) = store.get_document("users", "u1").await else {
            panic!("user missing");
        };
        assert_eq!(user["financialInfo"]["portfolioValue"], 500.0);

        let fresh = WriteBatch::new()
            .require_absent("users", "u2")
            .set("users", "u2", json!({ "name": "B" }));
        assert!(store.commit(fresh).await.is_ok());
    }

    #[tokio::test]
    async fn missing_update_target_aborts_batch() {
        let store = MemoryStore::new();
        let batch = WriteBatch::new()
            .set("withdrawals", "w1", json!({ "amount": 40.0 }))
            .update("users", "ghost", vec![("x".into(), json!(1))]);
        assert!(matches!(
            store.commit(batch).await,
            Err(SaviumError::DocumentNotFound { .. })
        ));
        assert_eq!(store.count("withdrawals").await, 0);
    }

    #[tokio::test]
    async fn watch_sees_full_documents_for_its_id_only() {
        let store = MemoryStore::new();
        let mut watch = store.subscribe("users", "u1");

        let _ = store.set_document("users", "u2", json!({ "name": "other" })).await;
        let _ = store.set_document("users", "u1", json!({ "name": "A", "n": 1 })).await;
        let _ = store
            .update_document("users", "u1", vec![("n".into(), json!(2))])
            .await;

        let Some(first) = watch.changed().await else {
            panic!("expected change");
        };
        assert_eq!(first, json!({ "name": "A", "n": 1 }));
        let Some(second) = watch.changed().await else {
            panic!("expected change");
        };
        assert_eq!(second, json!({ "name": "A", "n": 2 }));
        watch.dispose();
    }
}
