//! # DocumentStore Trait
//!
//! The seam between the engine and persistence.
//!
//! ```text
//! ┌───────────────────────┐         ┌─────────────────────────┐
//! │ BalanceLedger         │         │ MemoryStore             │
//! │ InventoryReplica      │──dyn───►│ SqliteStore             │
//! │ BatchMutator / Audit  │         │ (any remote adapter)    │
//! └───────────────────────┘         └─────────────────────────┘
//! ```
//!
//! Backends implement `get`, `query`, `commit`, `changes` and
//! `max_batch_size`. The point helpers are one-op batches.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::batch::{ChangeEvent, CommitReceipt, FieldChange, Precondition, WriteBatch};
use crate::document::{CollectionPath, Document};
use crate::error::StoreResult;
use crate::query::Query;

/// Capacity of the change broadcast channel.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read. `Ok(None)` when the document does not exist.
    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Document>>;

    /// Runs a filtered, ordered, limited query.
    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Applies every op in the batch or none of them.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<CommitReceipt>;

    /// Receiver of change events published after each successful commit.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Hard ceiling on ops per batch.
    fn max_batch_size(&self) -> usize;

    // -------------------------------------------------------------------------
    // Point helpers
    // -------------------------------------------------------------------------

    async fn create(&self, path: &CollectionPath, id: &str, data: Value) -> StoreResult<CommitReceipt> {
        let mut batch = WriteBatch::new();
        batch.create(path, id, data);
        self.commit(batch).await
    }

    async fn set(&self, path: &CollectionPath, id: &str, data: Value, pre: Precondition) -> StoreResult<CommitReceipt> {
        let mut batch = WriteBatch::new();
        batch.set(path, id, data, pre);
        self.commit(batch).await
    }

    async fn merge(&self, path: &CollectionPath, id: &str, data: Value) -> StoreResult<CommitReceipt> {
        let mut batch = WriteBatch::new();
        batch.merge(path, id, data);
        self.commit(batch).await
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        changes: Vec<FieldChange>,
        pre: Precondition,
    ) -> StoreResult<CommitReceipt> {
        let mut batch = WriteBatch::new();
        batch.update(path, id, changes, pre);
        self.commit(batch).await
    }

    async fn delete(&self, path: &CollectionPath, id: &str, pre: Precondition) -> StoreResult<CommitReceipt> {
        let mut batch = WriteBatch::new();
        batch.delete(path, id, pre);
        self.commit(batch).await
    }
}
