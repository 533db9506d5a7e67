//! # Store Error Types
//!
//! Error types for document store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / serde_json::Error / precondition miss                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds collection/id context                 │
//! │       │                                                                 │
//! │       ├── Conflict ──► ledger retries with a fresh read                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EngineError (tally-engine) ← Code + one-line message for the UI       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Document store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document does not exist.
    ///
    /// ## When This Occurs
    /// - `Update` on a missing document
    /// - `Set`/`Delete` with an `Exists` precondition
    /// - A targeted read of a debtor that was settled concurrently
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// `Create` on an id that is already taken.
    #[error("{collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },

    /// A version precondition failed.
    ///
    /// ## When This Occurs
    /// ```text
    /// Device A reads debtor @ v3 ──┐
    /// Device B reads debtor @ v3 ──┤
    /// Device B commits (v3 → v4) ──┤
    /// Device A commits expecting v3 ──► Conflict { expected: 3, actual: Some(4) }
    /// ```
    #[error("{collection}/{id} was modified concurrently (expected version {expected}, found {actual:?})")]
    Conflict {
        collection: String,
        id: String,
        expected: u64,
        actual: Option<u64>,
    },

    /// The batch exceeds the backend's operation limit. Nothing was written.
    #[error("Batch of {size} writes exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// A field path or patch could not be applied to the document shape.
    #[error("Invalid write: {0}")]
    InvalidWrite(String),

    /// Stored JSON did not match the requested type.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Backend connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal store error.
    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a NotFound error for a collection key and id.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates an AlreadyExists error.
    pub fn already_exists(collection: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::AlreadyExists {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// True for a failed compare-and-swap.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database (UNIQUE)  → StoreError::AlreadyExists
/// sqlx::Error::Database (other)   → StoreError::QueryFailed
/// sqlx::Error::PoolTimedOut       → StoreError::PoolExhausted
/// sqlx::Error::PoolClosed         → StoreError::ConnectionFailed
/// Other                           → StoreError::Internal
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: documents.collection, documents.id"
                if msg.contains("UNIQUE constraint failed") {
                    StoreError::AlreadyExists {
                        collection: "documents".to_string(),
                        id: "unknown".to_string(),
                    }
                } else {
                    StoreError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,

            sqlx::Error::PoolClosed => StoreError::ConnectionFailed("Pool is closed".to_string()),

            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidDocument(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
