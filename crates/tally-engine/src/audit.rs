//! # Audit Log
//!
//! Append-only record of every mutating action: who, what, when.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BalanceLedger / BatchMutator / Inventory / Checkout / Staff           │
//! │       │                                                                 │
//! │       │ mutation succeeded (or failed) on its own                       │
//! │       ▼                                                                 │
//! │  AuditLog::record ──create──► {ns}/logs/{uuid}                          │
//! │       │                                                                 │
//! │       └── write failed? warn! and carry on. Never retried.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries are never updated or deleted by the engine.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tally_core::{AuditAction, AuditLogEntry, Operation};
use tally_store::{DocumentStore, Query, SortDirection};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::document_body;
use crate::error::EngineResult;
use crate::session::Session;

#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn DocumentStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        AuditLog { store }
    }

    /// Appends one entry. Failures are logged and swallowed.
    ///
    /// A `Null` meta is stored as an empty object.
    pub async fn record(&self, session: &Session, action: AuditAction, details: impl Into<String>, meta: Value) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            action,
            details: details.into(),
            user: session.email().to_string(),
            store_name: session.store_name.clone(),
            timestamp: Utc::now(),
            meta: if meta.is_null() { json!({}) } else { meta },
        };

        let data = match document_body(&entry) {
            Ok(data) => data,
            Err(e) => {
                warn!(action = %action, error = %e, "Audit entry could not be encoded");
                return;
            }
        };

        match self.store.create(&session.logs_path(), &entry.id, data).await {
            Ok(_) => debug!(store = %session.namespace, action = %action, "Audit entry written"),
            Err(e) => warn!(store = %session.namespace, action = %action, error = %e, "Audit write failed"),
        }
    }

    /// Most recent entries first. Admin-tier only.
    pub async fn recent(&self, session: &Session, limit: usize) -> EngineResult<Vec<AuditLogEntry>> {
        session.authorize(Operation::ViewAuditLog)?;

        let query = Query::new(session.logs_path())
            .order_by("timestamp", SortDirection::Descending)
            .limit(limit);

        let entries = self
            .store
            .query(&query)
            .await?
            .iter()
            .filter_map(|doc| match doc.decode::<AuditLogEntry>() {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(id = %doc.id, error = %e, "Skipping unreadable audit entry");
                    None
                }
            })
            .collect();

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::{session_with_role, FailingStore};
    use tally_core::Role;
    use tally_store::MemoryStore;

    #[tokio::test]
    async fn test_record_and_read_back_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let audit = AuditLog::new(store.clone());
        let admin = session_with_role(Role::Admin);

        audit
            .record(&admin, AuditAction::DebtAdded, "Added ₦500.00 debt for Amina", Value::Null)
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        audit
            .record(&admin, AuditAction::Sale, "Sold 2 items. Total: ₦700.00", json!({"total": 70000}))
            .await;

        let entries = audit.recent(&admin, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::Sale);
        assert_eq!(entries[0].meta["total"], 70000);
        assert_eq!(entries[1].action, AuditAction::DebtAdded);
        assert_eq!(entries[1].meta, json!({}));
        assert_eq!(entries[1].user, admin.email());
        assert_eq!(entries[1].store_name, "Mama Put");
    }

    #[tokio::test]
    async fn test_recent_requires_admin() {
        let audit = AuditLog::new(Arc::new(MemoryStore::new()));
        let err = audit.recent(&session_with_role(Role::Manager), 10).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[tokio::test]
    async fn test_record_swallows_store_failure() {
        let audit = AuditLog::new(Arc::new(FailingStore));
        // Returns normally even though every write fails.
        audit
            .record(&session_with_role(Role::Staff), AuditAction::Sale, "Sold 1 items", Value::Null)
            .await;
    }
}
