//! # SQLite Document Store
//!
//! A [`DocumentStore`] persisted in one SQLite table.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SQLite Document Store                              │
//! │                                                                         │
//! │  SqliteStoreConfig::new(path) ← Configure pool settings                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqliteStore::connect(config).await ← Create pool + run migrations     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├── get / query ──► any connection, in parallel                  │
//! │       │                                                                 │
//! │       └── commit ──► write lock ──► one SQL transaction                 │
//! │                          │                                              │
//! │                          ├── read current rows, apply ops               │
//! │                          ├── INSERT / UPDATE … WHERE version = ?        │
//! │                          └── COMMIT ──► broadcast ChangeEvents          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases use WAL so readers never block the committing writer.
//! The `version = ?` guard on every update and delete still catches a writer
//! in another process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::batch::{apply_op, ChangeEvent, CommitReceipt, WriteBatch, WriteResult};
use crate::document::{CollectionPath, Document};
use crate::error::{StoreError, StoreResult};
use crate::migrations;
use crate::query::{Query, SortDirection};
use crate::store::{DocumentStore, CHANGE_CHANNEL_CAPACITY};
use tally_core::MAX_BATCH_WRITES;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

// =============================================================================
// Configuration
// =============================================================================

/// SQLite store configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = SqliteStoreConfig::new("/path/to/tally.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the database file. Ignored for in-memory stores.
    pub database_path: PathBuf,

    /// Keep the whole database in memory (tests).
    pub in_memory: bool,

    /// Default: 5
    pub max_connections: u32,

    /// Default: 1
    pub min_connections: u32,

    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps connections.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Default: true
    pub run_migrations: bool,

    /// Operation ceiling per batch. Default: 500
    pub max_batch_size: usize,
}

impl SqliteStoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteStoreConfig {
            database_path: path.into(),
            in_memory: false,
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
            max_batch_size: MAX_BATCH_WRITES,
        }
    }

    /// In-memory configuration for tests.
    ///
    /// An in-memory database lives exactly as long as its connection, so
    /// the pool holds a single connection that never idles out.
    pub fn in_memory() -> Self {
        SqliteStoreConfig {
            database_path: PathBuf::from(":memory:"),
            in_memory: true,
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            run_migrations: true,
            max_batch_size: MAX_BATCH_WRITES,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }
}

// =============================================================================
// Store
// =============================================================================

/// SQLite-backed document store.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    changes: broadcast::Sender<ChangeEvent>,
    /// Serializes commits from this process.
    write_lock: Mutex<()>,
    max_batch_size: usize,
}

impl SqliteStore {
    /// Opens the pool and runs migrations when enabled.
    pub async fn connect(config: SqliteStoreConfig) -> StoreResult<Self> {
        info!(
            path = %config.database_path.display(),
            in_memory = config.in_memory,
            "Initializing document store"
        );

        let connect_options = if config.in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
        } else {
            let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
            SqliteConnectOptions::from_str(&connect_url)
                .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true)
        }
        .busy_timeout(Duration::from_secs(5));

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout);
        if config.in_memory {
            pool_options = pool_options.max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Document store pool created");

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let store = SqliteStore {
            pool,
            changes,
            write_lock: Mutex::new(()),
            max_batch_size: config.max_batch_size,
        };

        if config.run_migrations {
            store.run_migrations().await?;
        }

        Ok(store)
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// For diagnostics and the seed binary.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        info!("Closing document store pool");
        self.pool.close().await;
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Number of documents in one collection.
    pub async fn count(&self, path: &CollectionPath) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(path.key())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

const SELECT_COLUMNS: &str = "SELECT id, version, data, created_at, updated_at FROM documents";

fn millis_to_datetime(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| StoreError::InvalidDocument(format!("bad timestamp {}", ms)))
}

fn row_to_document(row: &SqliteRow) -> StoreResult<Document> {
    let data: String = row.try_get("data")?;
    let version: i64 = row.try_get("version")?;
    Ok(Document {
        id: row.try_get("id")?,
        version: version as u64,
        data: serde_json::from_str(&data)?,
        created_at: millis_to_datetime(row.try_get("created_at")?)?,
        updated_at: millis_to_datetime(row.try_get("updated_at")?)?,
    })
}

/// `$."field"` so any top-level key is addressable.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn bind_json<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

// =============================================================================
// DocumentStore
// =============================================================================

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Document>> {
        let sql = format!("{} WHERE collection = ? AND id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(path.key())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let mut sql = format!("{} WHERE collection = ?", SELECT_COLUMNS);
        for filter in &query.filters {
            sql.push_str(&format!(" AND json_extract(data, ?) {} ?", filter.op.sql()));
        }
        match &query.order {
            Some(order) => {
                let dir = match order.direction {
                    SortDirection::Ascending => "ASC",
                    SortDirection::Descending => "DESC",
                };
                sql.push_str(&format!(" ORDER BY json_extract(data, ?) {}, id ASC", dir));
            }
            None => sql.push_str(" ORDER BY id ASC"),
        }
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query(&sql).bind(query.path.key());
        for filter in &query.filters {
            q = q.bind(json_path(&filter.field));
            q = bind_json(q, &filter.value);
        }
        if let Some(order) = &query.order {
            q = q.bind(json_path(&order.field));
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit as i64);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_document).collect()
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<CommitReceipt> {
        if batch.len() > self.max_batch_size {
            return Err(StoreError::BatchTooLarge {
                size: batch.len(),
                max: self.max_batch_size,
            });
        }
        if batch.is_empty() {
            return Ok(CommitReceipt::default());
        }

        let _write = self.write_lock.lock().await;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // (collection key, id) -> (version read from disk, staged result)
        let mut staged: HashMap<(String, String), (Option<u64>, Option<Document>)> = HashMap::new();
        let mut results = Vec::with_capacity(batch.len());
        let select_one = format!("{} WHERE collection = ? AND id = ?", SELECT_COLUMNS);

        for op in batch.ops() {
            let key = (op.path.key(), op.id.clone());
            let (original, current) = match staged.get(&key) {
                Some((original, doc)) => (*original, doc.clone()),
                None => {
                    let row = sqlx::query(&select_one)
                        .bind(key.0.clone())
                        .bind(key.1.clone())
                        .fetch_optional(&mut *tx)
                        .await?;
                    let doc = row.as_ref().map(row_to_document).transpose()?;
                    (doc.as_ref().map(|d| d.version), doc)
                }
            };

            let next = apply_op(op, current.as_ref(), now)?;
            results.push(WriteResult {
                path: op.path.clone(),
                id: op.id.clone(),
                version: next.as_ref().map(|d| d.version),
            });
            staged.insert(key, (original, next));
        }

        for ((collection, id), (original, doc)) in staged {
            match (original, doc) {
                (None, Some(doc)) => {
                    sqlx::query(
                        "INSERT INTO documents (collection, id, version, data, created_at, updated_at) \
                         VALUES (?, ?, ?, ?, ?, ?)",
                    )
                    .bind(collection.clone())
                    .bind(id.clone())
                    .bind(doc.version as i64)
                    .bind(doc.data.to_string())
                    .bind(doc.created_at.timestamp_millis())
                    .bind(doc.updated_at.timestamp_millis())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| match StoreError::from(e) {
                        StoreError::AlreadyExists { .. } => StoreError::already_exists(&collection, &id),
                        other => other,
                    })?;
                }
                (Some(expected), Some(doc)) => {
                    let result = sqlx::query(
                        "UPDATE documents SET version = ?, data = ?, updated_at = ? \
                         WHERE collection = ? AND id = ? AND version = ?",
                    )
                    .bind(doc.version as i64)
                    .bind(doc.data.to_string())
                    .bind(doc.updated_at.timestamp_millis())
                    .bind(collection.clone())
                    .bind(id.clone())
                    .bind(expected as i64)
                    .execute(&mut *tx)
                    .await?;
                    if result.rows_affected() == 0 {
                        return Err(StoreError::Conflict {
                            collection,
                            id,
                            expected,
                            actual: None,
                        });
                    }
                }
                (Some(expected), None) => {
                    let result =
                        sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ? AND version = ?")
                            .bind(collection.clone())
                            .bind(id.clone())
                            .bind(expected as i64)
                            .execute(&mut *tx)
                            .await?;
                    if result.rows_affected() == 0 {
                        return Err(StoreError::Conflict {
                            collection,
                            id,
                            expected,
                            actual: None,
                        });
                    }
                }
                (None, None) => {}
            }
        }

        tx.commit().await?;

        let receipt = CommitReceipt { results };
        debug!(writes = receipt.len(), "sqlite commit applied");
        for event in ChangeEvent::from_receipt(&receipt) {
            let _ = self.changes.send(event);
        }
        Ok(receipt)
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{FieldChange, Precondition};
    use crate::query::FilterOp;
    use serde_json::json;
    use tally_core::StoreNamespace;

    async fn store() -> SqliteStore {
        SqliteStore::connect(SqliteStoreConfig::in_memory()).await.unwrap()
    }

    fn items() -> CollectionPath {
        CollectionPath::items(&StoreNamespace::from_store_name("test").unwrap())
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = store().await;
        assert!(store.health_check().await);

        let (total, applied) = migrations::migration_status(store.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = SqliteStoreConfig::new("/tmp/tally.db")
            .max_connections(10)
            .min_connections(2)
            .max_batch_size(100);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_batch_size, 100);
        assert!(!config.in_memory);
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let store = store().await;
        let path = items();

        store.create(&path, "a", json!({"name": "Rice", "price": 450000})).await.unwrap();
        let doc = store.get(&path, "a").await.unwrap().unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.data["name"], "Rice");

        store
            .update(&path, "a", vec![FieldChange::set("price", 500000)], Precondition::Version(1))
            .await
            .unwrap();
        let doc = store.get(&path, "a").await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.data["price"], 500000);

        store.delete(&path, "a", Precondition::Version(2)).await.unwrap();
        assert!(store.get(&path, "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = store().await;
        let path = items();
        store.create(&path, "a", json!({"n": 1})).await.unwrap();
        store
            .update(&path, "a", vec![FieldChange::set("n", 2)], Precondition::Version(1))
            .await
            .unwrap();

        let err = store
            .update(&path, "a", vec![FieldChange::set("n", 3)], Precondition::Version(1))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get(&path, "a").await.unwrap().unwrap().data["n"], 2);
    }

    #[tokio::test]
    async fn test_failed_batch_writes_nothing() {
        let store = store().await;
        let path = items();
        store.create(&path, "taken", json!({})).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.create(&path, "fresh", json!({}));
        batch.create(&path, "taken", json!({}));
        assert!(store.commit(batch).await.unwrap_err().is_already_exists());

        assert!(store.get(&path, "fresh").await.unwrap().is_none());
        assert_eq!(store.count(&path).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_filters_order_limit() {
        let store = store().await;
        let path = items();
        let mut batch = WriteBatch::new();
        batch.create(&path, "1", json!({"name": "Sugar", "price": 900, "isDeleted": false}));
        batch.create(&path, "2", json!({"name": "Beans", "price": 1500, "isDeleted": false}));
        batch.create(&path, "3", json!({"name": "Rice", "price": 4500, "isDeleted": true}));
        batch.create(&path, "_config", json!({"staff": {}}));
        store.commit(batch).await.unwrap();

        let visible = Query::new(path.clone())
            .where_eq("isDeleted", false)
            .order_by("name", SortDirection::Ascending);
        let docs = store.query(&visible).await.unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.data["name"].as_str().unwrap_or_default()).collect();
        assert_eq!(names, vec!["Beans", "Sugar"]);

        let pricey = Query::new(path.clone())
            .filter("price", FilterOp::Gt, 1000)
            .order_by("price", SortDirection::Descending)
            .limit(1);
        let docs = store.query(&pricey).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "3");
    }

    #[tokio::test]
    async fn test_merge_and_dotted_keys() {
        let store = store().await;
        let path = items();
        store
            .merge(&path, "_config", json!({"staff": {"bala@shop.ng": {"role": "staff"}}}))
            .await
            .unwrap();
        store
            .merge(&path, "_config", json!({"staff": {"ada@shop.ng": "admin"}}))
            .await
            .unwrap();

        let doc = store.get(&path, "_config").await.unwrap().unwrap();
        assert_eq!(doc.data["staff"]["bala@shop.ng"]["role"], "staff");
        assert_eq!(doc.data["staff"]["ada@shop.ng"], "admin");
        assert_eq!(doc.version, 2);
    }

    #[tokio::test]
    async fn test_commit_publishes_change_event() {
        let store = store().await;
        let mut rx = store.changes();
        store.create(&items(), "a", json!({})).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().ids, vec!["a".to_string()]);
    }
}
