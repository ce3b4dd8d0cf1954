//! PostgreSQL implementation of the document store.
//!
//! Every document is one row of the `documents` table: `(collection, id)`
//! primary key and a JSONB body. Equality filters use JSONB containment,
//! ordering uses the text projection of the ordered field (timestamps are
//! fixed-width so text order is chronological). Batches run in a single
//! transaction with the guarded rows locked `FOR UPDATE`.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tokio::sync::broadcast;

use super::{
    CHANGE_FEED_CAPACITY, Direction, Document, DocumentChange, DocumentStore, DocumentWatch,
    FieldUpdates, Query, WhereClause, WriteBatch, WriteOp, apply_updates, compare_values,
    get_path, set_path,
};
use crate::error::SaviumError;

/// Connection settings for [`PostgresStore::connect`].
#[derive(Debug, Clone)]
pub struct PostgresSettings {
    /// `postgres://` connection URL.
    pub url: String,
    /// Pool upper bound.
    pub max_connections: u32,
    /// Pool lower bound.
    pub min_connections: u32,
    /// Connection acquire timeout.
    pub connect_timeout: std::time::Duration,
}

/// PostgreSQL-backed [`DocumentStore`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    changes: broadcast::Sender<DocumentChange>,
}

fn read_err(e: sqlx::Error) -> SaviumError {
    SaviumError::StoreRead(e.to_string())
}

fn write_err(e: sqlx::Error) -> SaviumError {
    SaviumError::StoreWrite(e.to_string())
}

/// Builds the JSONB object a document must contain to match `filters`.
fn containment(filters: &[WhereClause]) -> Value {
    let mut doc = Value::Object(Map::new());
    for clause in filters {
        set_path(&mut doc, &clause.field, clause.value.clone());
    }
    doc
}

fn path_array(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

impl PostgresStore {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    /// Connects a pool and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::StoreRead`] when the database is unreachable
    /// and [`SaviumError::StoreWrite`] when a migration fails.
    pub async fn connect(settings: &PostgresSettings) -> Result<Self, SaviumError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(&settings.url)
            .await
            .map_err(read_err)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| SaviumError::StoreWrite(format!("migration failed: {e}")))?;

        tracing::info!(
            max_connections = settings.max_connections,
            "document store connected to PostgreSQL"
        );
        Ok(Self::new(pool))
    }

    fn publish(&self, collection: &str, id: &str, data: &Value) {
        let _ = self.changes.send(DocumentChange {
            collection: collection.to_string(),
            id: id.to_string(),
            data: data.clone(),
        });
    }

    async fn lock_row(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
    ) -> Result<Option<Value>, SaviumError> {
        sqlx::query_scalar::<_, Value>(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(read_err)
    }

    async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
        data: &Value,
    ) -> Result<(), SaviumError> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data, updated_at) VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
        )
        .bind(collection)
        .bind(id)
        .bind(data)
        .execute(&mut **tx)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    /// Inserts a document that must not exist yet.
    async fn insert_new(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
        data: &Value,
    ) -> Result<(), SaviumError> {
        let inserted = sqlx::query(
            "INSERT INTO documents (collection, id, data, updated_at) VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (collection, id) DO NOTHING",
        )
        .bind(collection)
        .bind(id)
        .bind(data)
        .execute(&mut **tx)
        .await
        .map_err(write_err)?
        .rows_affected();
        if inserted == 0 {
            return Err(SaviumError::Conflict(format!("{collection}/{id} already exists")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, SaviumError> {
        sqlx::query_scalar::<_, Value>(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)
    }

    async fn set_document(&self, collection: &str, id: &str, data: Value) -> Result<(), SaviumError> {
        let mut tx = self.pool.begin().await.map_err(write_err)?;
        Self::upsert(&mut tx, collection, id, &data).await?;
        tx.commit().await.map_err(write_err)?;
        self.publish(collection, id, &data);
        Ok(())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: FieldUpdates,
    ) -> Result<(), SaviumError> {
        let mut tx = self.pool.begin().await.map_err(write_err)?;
        let mut doc = Self::lock_row(&mut tx, collection, id)
            .await?
            .ok_or_else(|| SaviumError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        apply_updates(&mut doc, &fields);
        Self::upsert(&mut tx, collection, id, &doc).await?;
        tx.commit().await.map_err(write_err)?;
        self.publish(collection, id, &doc);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, SaviumError> {
        let rows = match &query.order_by {
            Some(order) => {
                let direction = match order.direction {
                    Direction::Ascending => "ASC",
                    Direction::Descending => "DESC",
                };
                let sql = format!(
                    "SELECT id, data FROM documents WHERE collection = $1 AND data @> $2 \
                     ORDER BY data #>> $3 {direction}, id {direction} LIMIT $4"
                );
                sqlx::query_as::<_, (String, Value)>(&sql)
                    .bind(&query.collection)
                    .bind(containment(&query.filters))
                    .bind(path_array(&order.field))
                    .bind(query.limit.and_then(|l| i64::try_from(l).ok()))
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as::<_, (String, Value)>(
                    "SELECT id, data FROM documents WHERE collection = $1 AND data @> $2 \
                     ORDER BY id LIMIT $3",
                )
                .bind(&query.collection)
                .bind(containment(&query.filters))
                .bind(query.limit.and_then(|l| i64::try_from(l).ok()))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(read_err)?;

        let mut docs: Vec<Document> = rows
            .into_iter()
            .map(|(id, data)| Document { id, data })
            .collect();

        // Numeric fields sort by value, not by their text projection.
        if let Some(order) = &query.order_by
            && docs
                .iter()
                .any(|d| matches!(get_path(&d.data, &order.field), Some(Value::Number(_))))
        {
            docs.sort_by(|a, b| {
                let ord: Ordering =
                    compare_values(get_path(&a.data, &order.field), get_path(&b.data, &order.field));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        Ok(docs)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), SaviumError> {
        let mut tx = self.pool.begin().await.map_err(write_err)?;

        // Dropping the transaction on an error rolls it back.
        for pre in batch.preconditions() {
            let current = Self::lock_row(&mut tx, pre.collection(), pre.id()).await?;
            pre.check(current.as_ref())?;
        }

        let mut changed = Vec::with_capacity(batch.ops().len());
        for op in batch.ops() {
            match op {
                WriteOp::Set { collection, id, data } => {
                    // A missing row cannot be locked; the primary key decides
                    // between concurrent creators.
                    if batch.creates_only(collection, id) {
                        Self::insert_new(&mut tx, collection, id, data).await?;
                    } else {
                        Self::upsert(&mut tx, collection, id, data).await?;
                    }
                    changed.push((collection.clone(), id.clone(), data.clone()));
                }
                WriteOp::Update { collection, id, fields } => {
                    let mut doc = Self::lock_row(&mut tx, collection, id).await?.ok_or_else(|| {
                        SaviumError::DocumentNotFound {
                            collection: collection.clone(),
                            id: id.clone(),
                        }
                    })?;
                    apply_updates(&mut doc, fields);
                    Self::upsert(&mut tx, collection, id, &doc).await?;
                    changed.push((collection.clone(), id.clone(), doc));
                }
            }
        }

        tx.commit().await.map_err(write_err)?;
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
