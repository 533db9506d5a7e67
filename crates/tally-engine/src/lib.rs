//! # tally-engine: Ledger & Batched-Mutation Engine
//!
//! Orchestrates every Tally POS operation on top of the document store.
//!
//! ## Module Organization
//! ```text
//! tally_engine/
//! ├── lib.rs          ◄─── You are here (exports, tracing setup)
//! ├── engine.rs       ◄─── Facade: opens the store, hands out components
//! ├── session.rs      ◄─── Explicit caller context (store + identity)
//! ├── ledger.rs       ◄─── Balance Ledger (CAS retry, settlement, feed)
//! ├── inventory.rs    ◄─── Inventory Replica (live catalog view, trash)
//! ├── batch.rs        ◄─── Batch Mutator (bulk price update, CSV import)
//! ├── checkout.rs     ◄─── Cart state and checkout
//! ├── audit.rs        ◄─── Best-effort audit log
//! ├── staff.rs        ◄─── Staff map and categories
//! ├── config.rs       ◄─── EngineConfig from TALLY_* variables
//! └── error.rs        ◄─── EngineError returned to the UI
//! ```
//!
//! ## Call Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UI event                                                               │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  Session.authorize(op) ── denied ──► EngineError (no store call)        │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  BalanceLedger │ InventoryReplica │ BatchMutator │ Checkout             │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  tally-store (get / query / commit / subscribe)                         │
//! │     │                                                                   │
//! │     └──► AuditLog::record (side effect, failures swallowed)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audit;
pub mod batch;
pub mod checkout;
pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod session;
pub mod staff;

pub use audit::AuditLog;
pub use batch::{BatchMutator, BulkAdjustReport, ChunkReport, ImportReport};
pub use checkout::{CartState, Checkout, SaleReceipt};
pub use config::{EngineConfig, StoreBackend};
pub use engine::Engine;
pub use error::{EngineError, EngineResult, ErrorCode};
pub use inventory::{InventoryReplica, NoOpObserver, ReplicaObserver};
pub use ledger::{BalanceLedger, DebtorFeed, Posting, PostingOutcome};
pub use session::Session;
pub use staff::StaffDirectory;

use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tally_engine=trace` - Show trace for the engine only
/// - Default: `info,tally=debug,sqlx=warn`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Serializes a domain value as a document body. The id lives on the
/// document, not in its data.
pub(crate) fn document_body<T: Serialize>(value: &T) -> EngineResult<Value> {
    let mut data = serde_json::to_value(value)?;
    if let Value::Object(map) = &mut data {
        map.remove("id");
    }
    Ok(data)
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use tally_core::{Role, StaffIdentity, StoreNamespace};
    use tally_store::{
        ChangeEvent, CollectionPath, CommitReceipt, Document, DocumentStore, Query, StoreError, StoreResult,
        WriteBatch,
    };
    use tokio::sync::broadcast;

    use crate::session::Session;

    pub const STORE_NAME: &str = "Mama Put";

    /// Session for `{role}@shop.ng` named after the role.
    pub fn session_with_role(role: Role) -> Session {
        let identity = StaffIdentity {
            email: format!("{}@shop.ng", role.as_str()),
            role,
            display_name: Some(format!("{} user", role)),
        };
        Session::new(
            STORE_NAME,
            StoreNamespace::from_store_name(STORE_NAME).unwrap(),
            identity,
        )
    }

    /// Store whose every operation fails.
    pub struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn get(&self, _path: &CollectionPath, _id: &str) -> StoreResult<Option<Document>> {
            Err(StoreError::ConnectionFailed("offline".into()))
        }

        async fn query(&self, _query: &Query) -> StoreResult<Vec<Document>> {
            Err(StoreError::ConnectionFailed("offline".into()))
        }

        async fn commit(&self, _batch: WriteBatch) -> StoreResult<CommitReceipt> {
            Err(StoreError::ConnectionFailed("offline".into()))
        }

        fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
            broadcast::channel(1).1
        }

        fn max_batch_size(&self) -> usize {
            tally_core::MAX_BATCH_WRITES
        }
    }

    #[test]
    fn test_document_body_strips_id() {
        let body = crate::document_body(&serde_json::json!({"id": "x", "name": "Rice"})).unwrap();
        assert_eq!(body, serde_json::json!({"name": "Rice"}));
    }
}
