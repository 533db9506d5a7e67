//! # Inventory Replica
//!
//! A locally cached, live view of the store's visible catalog.
//!
//! ## Sync Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  start_sync(session, observer)                                          │
//! │       │                                                                 │
//! │       ├── stop_sync()  (at most one live subscription per replica)      │
//! │       ▼                                                                 │
//! │  subscribe(items where isDeleted == false)                              │
//! │       │                                                                 │
//! │       ▼  every snapshot                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │ decode (skip bad docs) ──► redact costPrice below admin tier     │   │
//! │  │        ──► sort by name (case-insensitive)                       │   │
//! │  │        ──► watch::Sender::send_replace ──► observer.on_render    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The replica is read-after-write consistent for the local writer: a write
//! is reflected by the next snapshot. Writes from other devices show up when
//! their change notification arrives.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{json, Value};
use tally_core::{
    AuditAction, CatalogItem, CatalogStats, ItemDraft, Operation, ValidationError, CONFIG_DOCUMENT_ID,
};
use tally_store::{subscribe, Document, DocumentStore, FieldChange, FieldPath, Precondition, Query};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::document_body;
use crate::error::{EngineError, EngineResult};
use crate::session::Session;

// =============================================================================
// Observer
// =============================================================================

/// Receives every new catalog snapshot. Called from the sync task.
pub trait ReplicaObserver: Send + Sync {
    fn on_render(&self, items: &[CatalogItem]);
}

/// Observer that ignores snapshots.
pub struct NoOpObserver;

impl ReplicaObserver for NoOpObserver {
    fn on_render(&self, _items: &[CatalogItem]) {}
}

// =============================================================================
// Replica
// =============================================================================

pub struct InventoryReplica {
    store: Arc<dyn DocumentStore>,
    audit: AuditLog,
    trash_limit: usize,
    items: Arc<watch::Sender<Vec<CatalogItem>>>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl InventoryReplica {
    pub fn new(store: Arc<dyn DocumentStore>, audit: AuditLog, trash_limit: usize) -> Self {
        let (items, _) = watch::channel(Vec::new());
        InventoryReplica {
            store,
            audit,
            trash_limit,
            items: Arc::new(items),
            sync_task: Mutex::new(None),
        }
    }

    /// Starts (or restarts) the live catalog view for `session`'s store.
    pub fn start_sync(&self, session: &Session, observer: Arc<dyn ReplicaObserver>) {
        self.stop_sync();

        let query = Query::new(session.items_path()).where_eq("isDeleted", false);
        let mut subscription = subscribe(self.store.clone(), query);
        let can_view_cost = session.can_view_cost();
        let items = self.items.clone();
        let namespace = session.namespace.clone();

        let handle = tokio::spawn(async move {
            while let Some(docs) = subscription.next().await {
                let snapshot = decode_items(&docs, can_view_cost);
                debug!(store = %namespace, count = snapshot.len(), "Catalog snapshot");
                observer.on_render(&snapshot);
                items.send_replace(snapshot);
            }
        });

        info!(store = %session.namespace, "Inventory sync started");
        *self.lock_task() = Some(handle);
    }

    /// Cancels the live subscription, if any. The last snapshot is kept.
    pub fn stop_sync(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
            debug!("Inventory sync stopped");
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.lock_task().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sync_task.lock().unwrap_or_else(|e| e.into_inner())
    }

    // =========================================================================
    // Local reads
    // =========================================================================

    /// Current snapshot, sorted by name.
    pub fn items(&self) -> Vec<CatalogItem> {
        self.items.borrow().clone()
    }

    /// Receiver that wakes on every new snapshot.
    pub fn watch(&self) -> watch::Receiver<Vec<CatalogItem>> {
        self.items.subscribe()
    }

    /// Items whose "name category" contains `term`. A category of `None` or
    /// `"All"` matches every category.
    pub fn search(&self, term: &str, category: Option<&str>) -> Vec<CatalogItem> {
        self.items
            .borrow()
            .iter()
            .filter(|item| item.matches_search(term, category))
            .cloned()
            .collect()
    }

    /// Distinct categories of visible items.
    pub fn categories(&self) -> Vec<String> {
        self.items
            .borrow()
            .iter()
            .map(|item| item.category.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats::from_items(&self.items.borrow())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn soft_delete(&self, session: &Session, item_id: &str) -> EngineResult<()> {
        session.authorize(Operation::SoftDeleteItem)?;
        self.set_deleted(session, item_id, true).await?;
        self.audit
            .record(session, AuditAction::SoftDelete, format!("Deleted item {}", item_id), Value::Null)
            .await;
        Ok(())
    }

    pub async fn restore(&self, session: &Session, item_id: &str) -> EngineResult<()> {
        session.authorize(Operation::RestoreItem)?;
        self.set_deleted(session, item_id, false).await?;
        self.audit
            .record(session, AuditAction::Restore, format!("Restored item {}", item_id), Value::Null)
            .await;
        Ok(())
    }

    async fn set_deleted(&self, session: &Session, item_id: &str, deleted: bool) -> EngineResult<()> {
        check_item_id(item_id)?;
        self.store
            .update(
                &session.items_path(),
                item_id,
                vec![
                    FieldChange::set("isDeleted", deleted),
                    FieldChange::set("updatedAt", Utc::now().timestamp_millis()),
                ],
                Precondition::Exists,
            )
            .await?;
        info!(store = %session.namespace, item_id, deleted, "Item delete flag changed");
        Ok(())
    }

    /// Soft-deleted items, up to the trash limit.
    pub async fn list_trash(&self, session: &Session) -> EngineResult<Vec<CatalogItem>> {
        session.authorize(Operation::ViewTrash)?;
        let query = Query::new(session.items_path())
            .where_eq("isDeleted", true)
            .limit(self.trash_limit);
        let docs = self.store.query(&query).await?;
        Ok(decode_items(&docs, session.can_view_cost()))
    }

    /// Creates an item (`item_id == None`) or edits an existing one.
    ///
    /// Cost price is only written for admin-tier callers; for anyone else it
    /// is ignored and left as stored.
    pub async fn save_item(
        &self,
        session: &Session,
        item_id: Option<&str>,
        mut draft: ItemDraft,
    ) -> EngineResult<CatalogItem> {
        session.authorize(match item_id {
            None => Operation::CreateItem,
            Some(_) => Operation::EditItem,
        })?;
        draft.validate()?;

        let can_view_cost = session.can_view_cost();
        if !can_view_cost {
            draft.cost_price = None;
        }

        let path = session.items_path();
        let now = Utc::now();

        match item_id {
            None => {
                let item = CatalogItem::from_draft(Uuid::new_v4().to_string(), draft, now);
                self.store.create(&path, &item.id, document_body(&item)?).await?;

                info!(store = %session.namespace, item_id = %item.id, "Item created");
                self.audit
                    .record(
                        session,
                        AuditAction::ItemCreated,
                        format!("Created item {}", item.name),
                        json!({ "itemId": item.id }),
                    )
                    .await;
                Ok(item.redacted(can_view_cost))
            }
            Some(id) => {
                check_item_id(id)?;

                let mut changes = vec![
                    FieldChange::set("name", draft.name.trim()),
                    FieldChange::set("price", json!(draft.price)),
                    FieldChange::set("category", draft.category_or_default()),
                    FieldChange::set("barcode", draft.barcode.trim()),
                    optional_money("bulkPrice", draft.bulk_price),
                    FieldChange::set("updatedAt", now.timestamp_millis()),
                ];
                if can_view_cost {
                    changes.push(optional_money("costPrice", draft.cost_price));
                }

                self.store.update(&path, id, changes, Precondition::Exists).await?;
                let doc = self
                    .store
                    .get(&path, id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("Item", id))?;
                let item: CatalogItem = doc.decode()?;

                info!(store = %session.namespace, item_id = %id, "Item updated");
                self.audit
                    .record(
                        session,
                        AuditAction::ItemUpdated,
                        format!("Updated item {}", item.name),
                        json!({ "itemId": id }),
                    )
                    .await;
                Ok(item.redacted(can_view_cost))
            }
        }
    }
}

impl Drop for InventoryReplica {
    fn drop(&mut self) {
        self.stop_sync();
    }
}

fn optional_money(field: &str, value: Option<tally_core::Money>) -> FieldChange {
    match value {
        Some(money) => FieldChange::set(field, json!(money)),
        None => FieldChange::Delete(FieldPath::field(field)),
    }
}

/// The configuration document shares the items collection.
fn check_item_id(item_id: &str) -> EngineResult<()> {
    if item_id.trim().is_empty() || item_id == CONFIG_DOCUMENT_ID {
        return Err(ValidationError::invalid_format("item id", "not a catalog item").into());
    }
    Ok(())
}

/// Decodes, redacts and sorts a snapshot of item documents.
fn decode_items(docs: &[Document], can_view_cost: bool) -> Vec<CatalogItem> {
    let mut items: Vec<CatalogItem> = docs
        .iter()
        .filter(|doc| doc.id != CONFIG_DOCUMENT_ID)
        .filter_map(|doc| match doc.decode::<CatalogItem>() {
            Ok(item) => Some(item.redacted(can_view_cost)),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "Skipping unreadable catalog item");
                None
            }
        })
        .collect();
    items.sort_by_cached_key(|item| item.name.to_lowercase());
    items
}
