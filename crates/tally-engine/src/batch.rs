//! # Batch Mutator
//!
//! Bulk catalog mutations committed as atomic batches no larger than the
//! batch budget.
//!
//! ## Chunking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1 000 visible items, budget 450                                        │
//! │                                                                         │
//! │  chunk 0: items   0..450  ── commit ──► ok       committed 450          │
//! │  chunk 1: items 450..900  ── commit ──► error    committed   0          │
//! │  chunk 2: items 900..1000 ── commit ──► ok       committed 100          │
//! │                                                                         │
//! │  Each chunk is all-or-nothing. A failed chunk is reported and the       │
//! │  remaining chunks still run. Nothing is retried.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both operations write a single audit entry summarizing the whole run.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tally_core::import::parse_catalog_import;
use tally_core::pricing::{adjust_price, Percentage, PriceDirection};
use tally_core::{AuditAction, CatalogItem, Operation, CONFIG_DOCUMENT_ID};
use tally_store::{CollectionPath, DocumentStore, FieldChange, Precondition, Query, SortDirection, WriteBatch, WriteKind};
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::config::EngineConfig;
use crate::document_body;
use crate::error::{EngineError, EngineResult};
use crate::session::Session;

// =============================================================================
// Reports
// =============================================================================

/// Outcome of one atomic commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChunkReport {
    pub index: usize,
    pub attempted: usize,
    pub committed: usize,
    pub error: Option<String>,
}

impl ChunkReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BulkAdjustReport {
    pub direction: PriceDirection,
    /// Percentage as entered, normalized (`"12.5"`).
    pub percent: String,
    pub updated: usize,
    pub failed: usize,
    pub chunks: Vec<ChunkReport>,
}

impl BulkAdjustReport {
    pub fn failed_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| !c.is_ok()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportReport {
    pub imported: usize,
    /// Rows that failed the shape check.
    pub skipped: usize,
    pub chunks: Vec<ChunkReport>,
}

// =============================================================================
// Batch Mutator
// =============================================================================

#[derive(Clone)]
pub struct BatchMutator {
    store: Arc<dyn DocumentStore>,
    audit: AuditLog,
    batch_budget: usize,
}

impl BatchMutator {
    /// The budget is capped at what the store accepts in one commit.
    pub fn new(store: Arc<dyn DocumentStore>, audit: AuditLog, config: &EngineConfig) -> Self {
        let batch_budget = config.batch_budget.min(store.max_batch_size()).max(1);
        BatchMutator {
            store,
            audit,
            batch_budget,
        }
    }

    pub fn batch_budget(&self) -> usize {
        self.batch_budget
    }

    /// Moves every visible item's price by `percent` in `direction`.
    ///
    /// New prices are computed before the first commit, so a price too
    /// large to store fails the run with nothing written.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let report = batch
    ///     .apply_percentage_adjustment(&session, PriceDirection::Increase, "10")
    ///     .await?;
    /// // 999 ──► 1099, 250 ──► 275
    /// assert!(report.is_complete());
    /// ```
    pub async fn apply_percentage_adjustment(
        &self,
        session: &Session,
        direction: PriceDirection,
        percent: &str,
    ) -> EngineResult<BulkAdjustReport> {
        session.authorize(Operation::BulkAdjustPrices)?;
        let pct: Percentage = percent.parse()?;
        pct.check_direction(direction)?;

        let path = session.items_path();
        let query = Query::new(path.clone())
            .where_eq("isDeleted", false)
            .order_by("name", SortDirection::Ascending);
        let docs = self.store.query(&query).await?;

        let now = Utc::now().timestamp_millis();
        let mut writes = Vec::with_capacity(docs.len());
        for doc in docs.iter().filter(|d| d.id != CONFIG_DOCUMENT_ID) {
            let item: CatalogItem = match doc.decode() {
                Ok(item) => item,
                Err(e) => {
                    warn!(id = %doc.id, error = %e, "Skipping unreadable catalog item");
                    continue;
                }
            };
            let new_price = adjust_price(item.price, direction, pct)?;
            writes.push((
                doc.id.clone(),
                WriteKind::Update(
                    vec![
                        FieldChange::set("price", json!(new_price)),
                        FieldChange::set("updatedAt", now),
                    ],
                    Precondition::Exists,
                ),
            ));
        }

        let chunks = self.commit_in_chunks(&path, writes).await;
        let report = BulkAdjustReport {
            direction,
            percent: pct.to_string(),
            updated: chunks.iter().map(|c| c.committed).sum(),
            failed: chunks.iter().filter(|c| !c.is_ok()).map(|c| c.attempted).sum(),
            chunks,
        };

        info!(
            store = %session.namespace,
            direction = %direction,
            percent = %report.percent,
            updated = report.updated,
            failed = report.failed,
            "Bulk price update finished"
        );
        self.audit
            .record(
                session,
                AuditAction::BulkUpdate,
                format!("{} {}% on all items", direction, report.percent),
                json!({ "updated": report.updated, "failedChunks": report.failed_chunks() }),
            )
            .await;

        Ok(report)
    }

    /// Creates one catalog item per valid row of a comma-separated import.
    pub async fn import_from_delimited_text(&self, session: &Session, raw: &str) -> EngineResult<ImportReport> {
        session.authorize(Operation::ImportCatalog)?;

        let parsed = parse_catalog_import(raw);
        let can_view_cost = session.can_view_cost();
        let now = Utc::now();

        let mut writes = Vec::with_capacity(parsed.rows.len());
        for mut draft in parsed.rows {
            if !can_view_cost {
                draft.cost_price = None;
            }
            let item = CatalogItem::from_draft(Uuid::new_v4().to_string(), draft, now);
            writes.push((item.id.clone(), WriteKind::Create(document_body(&item)?)));
        }

        let path = session.items_path();
        let chunks = self.commit_in_chunks(&path, writes).await;
        let report = ImportReport {
            imported: chunks.iter().map(|c| c.committed).sum(),
            skipped: parsed.skipped,
            chunks,
        };

        info!(
            store = %session.namespace,
            imported = report.imported,
            skipped = report.skipped,
            "Catalog import finished"
        );
        if report.imported > 0 {
            self.audit
                .record(
                    session,
                    AuditAction::BulkImport,
                    format!("Imported {} items", report.imported),
                    json!({ "skipped": report.skipped }),
                )
                .await;
        }

        Ok(report)
    }

    async fn commit_in_chunks(&self, path: &CollectionPath, writes: Vec<(String, WriteKind)>) -> Vec<ChunkReport> {
        let mut reports = Vec::new();
        let mut writes = writes.into_iter().peekable();
        let mut index = 0;

        while writes.peek().is_some() {
            let mut batch = WriteBatch::new();
            for (id, kind) in writes.by_ref().take(self.batch_budget) {
                batch.push(path, id, kind);
            }
            let attempted = batch.len();

            let report = match self.store.commit(batch).await {
                Ok(receipt) => {
                    debug!(chunk = index, writes = receipt.len(), "Chunk committed");
                    ChunkReport {
                        index,
                        attempted,
                        committed: receipt.len(),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(chunk = index, writes = attempted, error = %e, "Chunk failed");
                    ChunkReport {
                        index,
                        attempted,
                        committed: 0,
                        error: Some(EngineError::from(e).message),
                    }
                }
            };
            reports.push(report);
            index += 1;
        }

        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::session_with_role;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tally_core::{ItemDraft, Money, Role};
    use tally_store::{ChangeEvent, CommitReceipt, Document, MemoryStore, StoreError, StoreResult};
    use tokio::sync::broadcast;

    /// Memory store whose `fail_on`-th commit (0-based) fails.
    struct FlakyStore {
        inner: MemoryStore,
        commits: AtomicUsize,
        fail_on: usize,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Document>> {
            self.inner.get(path, id).await
        }

        async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
            self.inner.query(query).await
        }

        async fn commit(&self, batch: WriteBatch) -> StoreResult<CommitReceipt> {
            if self.commits.fetch_add(1, Ordering::SeqCst) == self.fail_on {
                return Err(StoreError::ConnectionFailed("offline".into()));
            }
            self.inner.commit(batch).await
        }

        fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
            self.inner.changes()
        }

        fn max_batch_size(&self) -> usize {
            self.inner.max_batch_size()
        }
    }

    fn mutator(store: Arc<dyn DocumentStore>) -> BatchMutator {
        let audit = AuditLog::new(store.clone());
        BatchMutator::new(store, audit, &EngineConfig::in_memory("owner@shop.ng"))
    }

    async fn seed(store: &dyn DocumentStore, prices: &[i64]) {
        let path = session_with_role(Role::Manager).items_path();
        for (i, price) in prices.iter().enumerate() {
            let draft = ItemDraft {
                name: format!("Item {:03}", i),
                price: Money::from_major(*price),
                ..Default::default()
            };
            let item = CatalogItem::from_draft(format!("item-{:03}", i), draft, Utc::now());
            store.create(&path, &item.id, document_body(&item).unwrap()).await.unwrap();
        }
    }

    async fn prices(store: &dyn DocumentStore) -> Vec<Money> {
        let path = session_with_role(Role::Manager).items_path();
        let query = Query::new(path)
            .where_eq("isDeleted", false)
            .order_by("name", SortDirection::Ascending);
        store
            .query(&query)
            .await
            .unwrap()
            .iter()
            .map(|d| d.decode::<CatalogItem>().unwrap().price)
            .collect()
    }

    #[tokio::test]
    async fn test_increase_and_decrease_round_to_whole_units() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        seed(store.as_ref(), &[999, 250]).await;
        let batch = mutator(store.clone());
        let manager = session_with_role(Role::Manager);

        let report = batch
            .apply_percentage_adjustment(&manager, PriceDirection::Increase, "10")
            .await
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.updated, 2);
        assert_eq!(prices(store.as_ref()).await, vec![Money::from_major(1099), Money::from_major(275)]);

        batch
            .apply_percentage_adjustment(&manager, PriceDirection::Decrease, "10%")
            .await
            .unwrap();
        assert_eq!(prices(store.as_ref()).await, vec![Money::from_major(989), Money::from_major(247)]);

        let admin = session_with_role(Role::Admin);
        let entries = batch.audit.recent(&admin, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].details, "decrease 10% on all items");
        assert_eq!(entries[0].meta["updated"], 2);
    }

    #[tokio::test]
    async fn test_adjustment_chunks_by_store_limit() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::with_max_batch_size(2));
        seed(store.as_ref(), &[100, 200, 300, 400, 500]).await;
        let batch = mutator(store.clone());
        assert_eq!(batch.batch_budget(), 2);

        let report = batch
            .apply_percentage_adjustment(&session_with_role(Role::Manager), PriceDirection::Increase, "50")
            .await
            .unwrap();

        let sizes: Vec<usize> = report.chunks.iter().map(|c| c.attempted).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(report.updated, 5);
        assert_eq!(prices(store.as_ref()).await[4], Money::from_major(750));
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_stop_later_chunks() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::with_max_batch_size(2),
            commits: AtomicUsize::new(0),
            fail_on: 0,
        });
        seed(&store.inner, &[100, 200, 300]).await;
        let batch = mutator(store.clone());

        let report = batch
            .apply_percentage_adjustment(&session_with_role(Role::Manager), PriceDirection::Increase, "100")
            .await
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.failed_chunks(), 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.updated, 1);
        assert!(report.chunks[0].error.is_some());
        assert!(report.chunks[1].is_ok());

        // Chunk 0 changed nothing, chunk 1 doubled the last item.
        assert_eq!(
            prices(&store.inner).await,
            vec![Money::from_major(100), Money::from_major(200), Money::from_major(600)]
        );
    }

    #[tokio::test]
    async fn test_adjustment_guards() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let batch = mutator(store);

        let err = batch
            .apply_percentage_adjustment(&session_with_role(Role::Staff), PriceDirection::Increase, "10")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);

        let manager = session_with_role(Role::Manager);
        for bad in ["0", "-5", "abc", ""] {
            let err = batch
                .apply_percentage_adjustment(&manager, PriceDirection::Increase, bad)
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::ValidationError, "input {:?}", bad);
        }

        let err = batch
            .apply_percentage_adjustment(&manager, PriceDirection::Decrease, "100")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_overflowing_price_aborts_before_any_commit() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        seed(store.as_ref(), &[100, i64::MAX / 200]).await;
        let batch = mutator(store.clone());

        let err = batch
            .apply_percentage_adjustment(&session_with_role(Role::Manager), PriceDirection::Increase, "200")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(prices(store.as_ref()).await[0], Money::from_major(100));

        let err = batch
            .apply_percentage_adjustment(&session_with_role(Role::Manager), PriceDirection::Increase, "9300000000000000")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_import_creates_visible_items() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::with_max_batch_size(2));
        let batch = mutator(store.clone());
        let raw = "name,barcode,price,category,costPrice\r\n\
                   \"Rice, 5kg\",600123,4500,Grains,4000\r\n\
                   Sugar,600124,1200\r\n\
                   \r\n\
                   Broken,,300\r\n\
                   Milk,600125,800,Dairy\r\n";

        let report = batch
            .import_from_delimited_text(&session_with_role(Role::Manager), raw)
            .await
            .unwrap();
        assert_eq!(report.imported, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.chunks.len(), 2);

        let path = session_with_role(Role::Manager).items_path();
        let docs = store
            .query(&Query::new(path).where_eq("isDeleted", false))
            .await
            .unwrap();
        let items: Vec<CatalogItem> = docs.iter().map(|d| d.decode().unwrap()).collect();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| !i.is_deleted && i.cost_price.is_none()));
        assert!(items.iter().any(|i| i.name == "Rice, 5kg" && i.category == "Grains"));
    }

    #[tokio::test]
    async fn test_import_keeps_cost_for_admin() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let batch = mutator(store.clone());
        let raw = "name,barcode,price,category,costPrice\nRice,600123,4500,Grains,4000\n";

        let admin = session_with_role(Role::Admin);
        let report = batch.import_from_delimited_text(&admin, raw).await.unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.chunks.len(), 1);

        let docs = store.query(&Query::new(admin.items_path())).await.unwrap();
        let item: CatalogItem = docs[0].decode().unwrap();
        assert_eq!(item.cost_price, Some(Money::from_major(4000)));

        let entries = batch.audit.recent(&admin, 1).await.unwrap();
        assert_eq!(entries[0].details, "Imported 1 items");
    }

    #[tokio::test]
    async fn test_import_denied_for_staff() {
        let batch = mutator(Arc::new(MemoryStore::new()));
        let err = batch
            .import_from_delimited_text(&session_with_role(Role::Staff), "h\na,b,1\n")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }
}
