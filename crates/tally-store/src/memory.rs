//! In-memory document store.
//!
//! Used by tests and the `memory` backend. Commits stage every op against an
//! overlay first, so a failing op leaves the maps untouched.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::batch::{apply_op, ChangeEvent, CommitReceipt, WriteBatch, WriteResult};
use crate::document::{CollectionPath, Document};
use crate::error::{StoreError, StoreResult};
use crate::query::Query;
use crate::store::{DocumentStore, CHANGE_CHANNEL_CAPACITY};
use tally_core::MAX_BATCH_WRITES;

type Collections = HashMap<CollectionPath, BTreeMap<String, Document>>;

#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    changes: broadcast::Sender<ChangeEvent>,
    max_batch_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_batch_size(MAX_BATCH_WRITES)
    }

    /// Store with a custom batch ceiling, for exercising chunking.
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        MemoryStore {
            collections: RwLock::new(HashMap::new()),
            changes,
            max_batch_size,
        }
    }

    /// Total documents across all collections.
    pub fn document_count(&self) -> usize {
        self.collections
            .read()
            .map(|c| c.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Internal("lock poisoned".to_string())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.get(path).and_then(|c| c.get(id)).cloned())
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(match collections.get(&query.path) {
            Some(docs) => query.evaluate(docs.values()),
            None => Vec::new(),
        })
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

        let now = Utc::now();
        let receipt = {
            let mut collections = self.collections.write().map_err(|_| poisoned())?;

            // Stage: (path, id) -> resulting document (None = deleted).
            let mut staged: HashMap<(CollectionPath, String), Option<Document>> = HashMap::new();
            let mut results = Vec::with_capacity(batch.len());

            for op in batch.ops() {
                let key = (op.path.clone(), op.id.clone());
                let current = match staged.get(&key) {
                    Some(doc) => doc.clone(),
                    None => collections.get(&op.path).and_then(|c| c.get(&op.id)).cloned(),
                };
                let next = apply_op(op, current.as_ref(), now)?;
                results.push(WriteResult {
                    path: op.path.clone(),
                    id: op.id.clone(),
                    version: next.as_ref().map(|d| d.version),
                });
                staged.insert(key, next);
            }

            for ((path, id), doc) in staged {
                let collection = collections.entry(path).or_default();
                match doc {
                    Some(doc) => {
                        collection.insert(id, doc);
                    }
                    None => {
                        collection.remove(&id);
                    }
                }
            }

            CommitReceipt { results }
        };

        debug!(writes = receipt.len(), "memory commit applied");
        for event in ChangeEvent::from_receipt(&receipt) {
            // No receivers is fine.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{FieldChange, Precondition};
    use serde_json::json;
    use tally_core::StoreNamespace;

    fn items() -> CollectionPath {
        CollectionPath::items(&StoreNamespace::from_store_name("test").unwrap())
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let store = MemoryStore::new();
        let path = items();

        store.create(&path, "a", json!({"name": "Rice"})).await.unwrap();
        let doc = store.get(&path, "a").await.unwrap().unwrap();
        assert_eq!(doc.version, 1);

        store
            .update(&path, "a", vec![FieldChange::set("name", "Beans")], Precondition::Version(1))
            .await
            .unwrap();
        let doc = store.get(&path, "a").await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.data["name"], "Beans");

        store.delete(&path, "a", Precondition::Exists).await.unwrap();
        assert!(store.get(&path, "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        let path = items();
        store.create(&path, "taken", json!({})).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.create(&path, "new", json!({"name": "x"}));
        batch.create(&path, "taken", json!({}));
        let err = store.commit(batch).await.unwrap_err();

        assert!(err.is_already_exists());
        assert!(store.get(&path, "new").await.unwrap().is_none());
        assert_eq!(store.document_count(), 1);
    }

    #[tokio::test]
    async fn test_batch_too_large_rejected() {
        let store = MemoryStore::with_max_batch_size(2);
        let path = items();
        let mut batch = WriteBatch::new();
        for i in 0..3 {
            batch.create(&path, i.to_string(), json!({}));
        }
        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge { size: 3, max: 2 }));
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn test_ops_in_one_batch_see_each_other() {
        let store = MemoryStore::new();
        let path = items();
        let mut batch = WriteBatch::new();
        batch.create(&path, "a", json!({"n": 1}));
        batch.update(&path, "a", vec![FieldChange::set("n", 2)], Precondition::Version(1));
        let receipt = store.commit(batch).await.unwrap();

        assert_eq!(receipt.results[1].version, Some(2));
        assert_eq!(store.get(&path, "a").await.unwrap().unwrap().data["n"], 2);
    }

    #[tokio::test]
    async fn test_commit_publishes_change_event() {
        let store = MemoryStore::new();
        let mut rx = store.changes();
        store.create(&items(), "a", json!({})).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.path, items());
        assert_eq!(event.ids, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_query_missing_collection_is_empty() {
        let store = MemoryStore::new();
        let docs = store.query(&Query::new(items())).await.unwrap();
        assert!(docs.is_empty());
    }
}
