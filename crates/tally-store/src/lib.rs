//! # tally-store: Document Store Adapter for Tally POS
//!
//! Typed point reads and writes, queries, atomic batches with preconditions
//! and live query subscriptions over a collection-oriented document store.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Data Flow                              │
//! │                                                                         │
//! │  BalanceLedger.post_transaction / InventoryReplica.start_sync          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tally-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ DocumentStore │    │  WriteBatch   │    │ Subscription │  │   │
//! │  │   │  (store.rs)   │    │  (batch.rs)   │    │              │  │   │
//! │  │   │               │    │               │    │ snapshot on  │  │   │
//! │  │   │ get / query   │◄───│ Create / Set  │    │ every change │  │   │
//! │  │   │ commit        │    │ Merge/Update  │    │              │  │   │
//! │  │   │ changes()     │    │ Delete + pre  │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                                                     │   │
//! │  │     ┌─────┴──────┐                                              │   │
//! │  │     ▼            ▼                                              │   │
//! │  │  MemoryStore   SqliteStore ── migrations/sqlite/001_documents   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`document`] - Collection paths, field paths, the `Document` shape
//! - [`query`] - Filters, ordering, limits
//! - [`batch`] - Write ops, preconditions, receipts, change events
//! - [`store`] - The `DocumentStore` trait
//! - [`subscription`] - Live query subscriptions
//! - [`memory`] - In-memory backend
//! - [`sqlite`] - SQLite backend
//! - [`migrations`] - Embedded migrations
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_store::{CollectionPath, DocumentStore, SqliteStore, SqliteStoreConfig};
//!
//! let store = SqliteStore::connect(SqliteStoreConfig::new("./tally.db")).await?;
//! let doc = store.get(&CollectionPath::items(&ns), "_config").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod batch;
pub mod document;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod query;
pub mod sqlite;
pub mod store;
pub mod subscription;

// =============================================================================
// Re-exports
// =============================================================================

pub use batch::{
    ChangeEvent, CommitReceipt, FieldChange, Precondition, WriteBatch, WriteKind, WriteOp, WriteResult,
};
pub use document::{Collection, CollectionPath, Document, FieldPath};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use query::{Filter, FilterOp, OrderBy, Query, SortDirection};
pub use sqlite::{SqliteStore, SqliteStoreConfig};
pub use store::DocumentStore;
pub use subscription::{subscribe, SnapshotStream, Subscription};
