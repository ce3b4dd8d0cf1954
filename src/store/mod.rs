//! Document store: the identity/document storage contract and its backends.
//!
//! Provides the [`DocumentStore`] trait for per-entity JSON documents with
//! field queries, dotted-path partial updates, atomic multi-document
//! batches and change subscriptions. Two implementations exist:
//! [`MemoryStore`] (default, process-local) and [`PostgresStore`]
//! (`sqlx::PgPool`, one JSONB row per document).

pub mod memory;
pub mod postgres;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::SaviumError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Capacity of a store's change feed.
pub const CHANGE_FEED_CAPACITY: usize = 1024;

/// Partial update: `(dotted.path, new value)` pairs applied in order.
pub type FieldUpdates = Vec<(String, Value)>;

/// A stored document with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id within its collection.
    pub id: String,
    /// Document body.
    pub data: Value,
}

/// Equality filter on a (possibly dotted) field.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    /// Dotted field path.
    pub field: String,
    /// Value the field must equal.
    pub value: Value,
}

/// Sort direction of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Ordering of query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Dotted field path to order by.
    pub field: String,
    /// Sort direction.
    pub direction: Direction,
}

/// A collection query: equality filters, optional ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Collection to read.
    pub collection: String,
    /// Filters, all of which must match.
    pub filters: Vec<WhereClause>,
    /// Result ordering.
    pub order_by: Option<OrderBy>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl Query {
    /// Starts a query over `collection`.
    #[must_use]
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Adds a `field == value` filter.
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(WhereClause {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Orders results by `field`.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Condition checked before a batch is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// The document exists and holds `expected` at `path`.
    FieldEquals {
        /// Collection of the guarded document.
        collection: String,
        /// Id of the guarded document.
        id: String,
        /// Dotted field path.
        path: String,
        /// Value the field must currently hold.
        expected: Value,
    },
    /// The document does not exist yet.
    Absent {
        /// Collection of the guarded document.
        collection: String,
        /// Id of the guarded document.
        id: String,
    },
}

impl Precondition {
    /// Collection of the guarded document.
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::FieldEquals { collection, .. } | Self::Absent { collection, .. } => collection,
        }
    }

    /// Id of the guarded document.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::FieldEquals { id, .. } | Self::Absent { id, .. } => id,
        }
    }

    /// Checks the condition against the current body of the guarded
    /// document (`None` when it does not exist).
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::Conflict`] when the condition does not hold.
    pub fn check(&self, current: Option<&Value>) -> Result<(), SaviumError> {
        match (self, current) {
            (Self::FieldEquals { path, expected, .. }, Some(doc))
                if values_match(get_path(doc, path), expected) =>
            {
                Ok(())
            }
            (Self::FieldEquals { collection, id, .. }, None) => Err(SaviumError::Conflict(
                format!("{collection}/{id} no longer exists"),
            )),
            (Self::FieldEquals { collection, id, path, .. }, Some(_)) => Err(
                SaviumError::Conflict(format!("{collection}/{id} field {path} changed")),
            ),
            (Self::Absent { .. }, None) => Ok(()),
            (Self::Absent { collection, id }, Some(_)) => Err(SaviumError::Conflict(format!(
                "{collection}/{id} already exists"
            ))),
        }
    }
}

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Full overwrite (or create) of a document.
    Set {
        /// Target collection.
        collection: String,
        /// Target id.
        id: String,
        /// New document body.
        data: Value,
    },
    /// Dotted-path partial update of an existing document.
    Update {
        /// Target collection.
        collection: String,
        /// Target id.
        id: String,
        /// Field updates.
        fields: FieldUpdates,
    },
}

/// An atomic group of writes guarded by preconditions.
///
/// Either every precondition holds and every write is applied, or nothing
/// is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    preconditions: Vec<Precondition>,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `collection/id` to hold `expected` at `path` at commit time.
    #[must_use]
    pub fn require(
        mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        path: impl Into<String>,
        expected: impl Into<Value>,
    ) -> Self {
        self.preconditions.push(Precondition::FieldEquals {
            collection: collection.into(),
            id: id.into(),
            path: path.into(),
            expected: expected.into(),
        });
        self
    }

    /// Requires `collection/id` not to exist at commit time.
    ///
    /// A [`WriteOp::Set`] of the same document in this batch becomes a
    /// create that fails with [`SaviumError::Conflict`] if another writer
    /// got there first.
    #[must_use]
    pub fn require_absent(mut self, collection: impl Into<String>, id: impl Into<String>) -> Self {
        self.preconditions.push(Precondition::Absent {
            collection: collection.into(),
            id: id.into(),
        });
        self
    }

    /// Returns `true` if the batch may only create `collection/id`.
    #[must_use]
    pub fn creates_only(&self, collection: &str, id: &str) -> bool {
        self.preconditions.iter().any(|pre| {
            matches!(pre, Precondition::Absent { .. })
                && pre.collection() == collection
                && pre.id() == id
        })
    }

    /// Adds a full-document write.
    #[must_use]
    pub fn set(mut self, collection: impl Into<String>, id: impl Into<String>, data: Value) -> Self {
        self.ops.push(WriteOp::Set {
            collection: collection.into(),
            id: id.into(),
            data,
        });
        self
    }

    /// Adds a partial update.
    #[must_use]
    pub fn update(
        mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        fields: FieldUpdates,
    ) -> Self {
        self.ops.push(WriteOp::Update {
            collection: collection.into(),
            id: id.into(),
            fields,
        });
        self
    }

    /// Preconditions in insertion order.
    #[must_use]
    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    /// Writes in insertion order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

/// A committed document body, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    /// Collection of the changed document.
    pub collection: String,
    /// Id of the changed document.
    pub id: String,
    /// Full document body after the change.
    pub data: Value,
}

/// Subscription to one document.
///
/// Each emission is the full document after a change; consumers replace
/// their local copy rather than merging. Dropping or disposing the watch
/// unsubscribes.
#[derive(Debug)]
pub struct DocumentWatch {
    collection: String,
    id: String,
    rx: broadcast::Receiver<DocumentChange>,
}

impl DocumentWatch {
    /// Creates a watch over `collection/id` fed by `rx`.
    #[must_use]
    pub fn new(
        collection: impl Into<String>,
        id: impl Into<String>,
        rx: broadcast::Receiver<DocumentChange>,
    ) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            rx,
        }
    }

    /// Waits for the next change of the watched document.
    ///
    /// Returns `None` once the store shuts down. Lagging watchers skip the
    /// intermediate versions and resume with the next one.
    pub async fn changed(&mut self) -> Option<Value> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.collection == self.collection && change.id == self.id => {
                    return Some(change.data);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        collection = %self.collection,
                        id = %self.id,
                        lagged = n,
                        "document watch lagged; skipping to latest"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Ends the subscription.
    pub fn dispose(self) {
        tracing::debug!(collection = %self.collection, id = %self.id, "document watch disposed");
    }
}

/// Identity/document store contract.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Short backend name for diagnostics.
    fn backend(&self) -> &'static str;

    /// Reads one document. `Ok(None)` when it does not exist.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, SaviumError>;

    /// Creates or fully overwrites one document.
    async fn set_document(&self, collection: &str, id: &str, data: Value) -> Result<(), SaviumError>;

    /// Applies dotted-path updates to an existing document.
    ///
    /// Fails with [`SaviumError::DocumentNotFound`] if it does not exist.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: FieldUpdates,
    ) -> Result<(), SaviumError>;

    /// Runs a collection query.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, SaviumError>;

    /// Applies a batch atomically after checking its preconditions.
    ///
    /// A failed precondition yields [`SaviumError::Conflict`] and writes
    /// nothing.
    async fn commit(&self, batch: WriteBatch) -> Result<(), SaviumError>;

    /// Subscribes to changes of one document.
    fn subscribe(&self, collection: &str, id: &str) -> DocumentWatch;
}

/// Reads the value at a dotted path.
#[must_use]
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |node, key| node.get(key))
}

/// Writes `value` at a dotted path, creating intermediate objects.
///
/// Non-object intermediates are replaced by objects.
pub fn set_path(doc: &mut Value, path: &str, value: Value) {
    let mut node = doc;
    let mut keys = path.split('.').peekable();
    while let Some(key) = keys.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        if keys.peek().is_none() {
            map.insert(key.to_string(), value);
            return;
        }
        node = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Applies a list of field updates to a document body.
pub fn apply_updates(doc: &mut Value, fields: &[(String, Value)]) {
    for (path, value) in fields {
        set_path(doc, path, value.clone());
    }
}

/// Compares two field values for a precondition. Numbers compare by value.
#[must_use]
pub fn values_match(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(a), b) => a == b,
        (None, Value::Null) => true,
        (None, _) => false,
    }
}

/// Returns `true` when `doc` satisfies every filter.
#[must_use]
pub fn matches_filters(doc: &Value, filters: &[WhereClause]) -> bool {
    filters
        .iter()
        .all(|clause| values_match(get_path(doc, &clause.field), &clause.value))
}

/// Orders two optional field values: numbers numerically, strings
/// lexically, missing values first.
#[must_use]
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
